//! Raw execution report returned by the ledger for one submitted batch.
//!
//! The shape mirrors what a ledger node sends back and is deliberately
//! loose: almost every field is optional, because a node may omit object,
//! balance or event detail depending on the request flags. Only the
//! effects extractor interprets these types; nothing else should reach
//! into them.
//!
//! Amounts are carried as strings, as ledger nodes emit them, and are
//! parsed into integers by the extractor.

use serde::{Deserialize, Serialize};

use crate::{Address, ObjectId, Result};

/// Execution outcome of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ExecutionStatus {
    Success,
    Failure {
        #[serde(default)]
        error: Option<String>,
    },
}

impl ExecutionStatus {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Who owns an object after execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Owner {
    AddressOwner(Address),
    ObjectOwner(ObjectId),
    Shared { initial_shared_version: u64 },
    Immutable,
}

impl Owner {
    /// The owning account, if the object is address-owned.
    #[must_use]
    pub fn address(&self) -> Option<&Address> {
        match self {
            Self::AddressOwner(addr) => Some(addr),
            _ => None,
        }
    }
}

/// One object-level effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ObjectChange {
    Created {
        #[serde(default)]
        object_id: Option<ObjectId>,
        #[serde(default)]
        object_type: Option<String>,
        #[serde(default)]
        owner: Option<Owner>,
    },
    Mutated {
        #[serde(default)]
        object_id: Option<ObjectId>,
        #[serde(default)]
        object_type: Option<String>,
        #[serde(default)]
        owner: Option<Owner>,
    },
    Deleted {
        #[serde(default)]
        object_id: Option<ObjectId>,
        #[serde(default)]
        object_type: Option<String>,
    },
    /// Change kinds this core does not interpret (published, wrapped, ...).
    #[serde(other)]
    Other,
}

/// A signed balance delta attributed to one owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceChange {
    #[serde(default)]
    pub owner: Option<Owner>,
    #[serde(default)]
    pub coin_type: Option<String>,
    /// Signed integer in the coin's minor unit, as a decimal string.
    #[serde(default)]
    pub amount: Option<String>,
}

/// An event emitted by a called function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmittedEvent {
    #[serde(default, rename = "type")]
    pub event_type: Option<String>,
    #[serde(default)]
    pub sender: Option<Address>,
    #[serde(default)]
    pub parsed_json: Option<serde_json::Value>,
}

/// Network fee charged for the batch, in the native coin's minor unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasSummary {
    pub computation_cost: u64,
    pub storage_cost: u64,
    pub storage_rebate: u64,
}

impl GasSummary {
    /// Net fee actually removed from circulation. A rebate larger than the
    /// charges is clamped to zero. `None` when the charges overflow `u64`.
    #[must_use]
    pub fn net_fee(&self) -> Option<u64> {
        self.computation_cost
            .checked_add(self.storage_cost)
            .map(|charged| charged.saturating_sub(self.storage_rebate))
    }
}

/// Raw output of one submitted batch. Ephemeral: consumed once.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
    #[serde(default)]
    pub digest: Option<String>,
    /// Mandatory. A report without it is malformed.
    #[serde(default)]
    pub status: Option<ExecutionStatus>,
    #[serde(default)]
    pub object_changes: Option<Vec<ObjectChange>>,
    #[serde(default)]
    pub balance_changes: Option<Vec<BalanceChange>>,
    #[serde(default)]
    pub events: Option<Vec<EmittedEvent>>,
    #[serde(default)]
    pub gas_used: Option<GasSummary>,
}

impl ExecutionReport {
    /// Parse a report from the ledger's JSON response body.
    ///
    /// # Errors
    /// Returns [`crate::TurnstileError::Serialization`] on invalid JSON.
    pub fn from_json(body: &str) -> Result<Self> {
        Ok(serde_json::from_str(body)?)
    }
}

/// Snapshot of a single object as returned by a ledger lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectSnapshot {
    pub object_id: ObjectId,
    #[serde(default)]
    pub object_type: Option<String>,
    #[serde(default)]
    pub owner: Option<Owner>,
    #[serde(default)]
    pub version: Option<u64>,
    /// Decoded object fields, when the node was asked to include them.
    #[serde(default)]
    pub fields: Option<serde_json::Value>,
}

/// Report fixtures. **Never use in production.**
#[cfg(any(test, feature = "test-helpers"))]
impl ExecutionReport {
    pub fn dummy_success() -> Self {
        Self {
            digest: Some("dummy-digest".to_string()),
            status: Some(ExecutionStatus::Success),
            object_changes: Some(Vec::new()),
            balance_changes: Some(Vec::new()),
            events: Some(Vec::new()),
            gas_used: None,
        }
    }

    pub fn dummy_failure(cause: &str) -> Self {
        Self {
            status: Some(ExecutionStatus::Failure {
                error: Some(cause.to_string()),
            }),
            ..Self::dummy_success()
        }
    }

    #[must_use]
    pub fn with_created(mut self, id: &str, object_type: &str, owner: Option<Owner>) -> Self {
        self.object_changes
            .get_or_insert_with(Vec::new)
            .push(ObjectChange::Created {
                object_id: Some(ObjectId::new(id)),
                object_type: Some(object_type.to_string()),
                owner,
            });
        self
    }

    #[must_use]
    pub fn with_mutated(mut self, id: &str, object_type: &str, owner: Option<Owner>) -> Self {
        self.object_changes
            .get_or_insert_with(Vec::new)
            .push(ObjectChange::Mutated {
                object_id: Some(ObjectId::new(id)),
                object_type: Some(object_type.to_string()),
                owner,
            });
        self
    }

    #[must_use]
    pub fn with_balance_change(mut self, owner: &str, coin_type: &str, amount: i128) -> Self {
        self.balance_changes
            .get_or_insert_with(Vec::new)
            .push(BalanceChange {
                owner: Some(Owner::AddressOwner(Address::new(owner))),
                coin_type: Some(coin_type.to_string()),
                amount: Some(amount.to_string()),
            });
        self
    }

    #[must_use]
    pub fn with_gas(mut self, computation_cost: u64, storage_cost: u64, storage_rebate: u64) -> Self {
        self.gas_used = Some(GasSummary {
            computation_cost,
            storage_cost,
            storage_rebate,
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ledger_json() {
        let body = r#"{
            "digest": "9xQ",
            "status": { "status": "success" },
            "objectChanges": [
                { "type": "created", "objectId": "0xaa", "objectType": "0x1::ticketing::Ticket",
                  "owner": { "AddressOwner": "0xbuyer" } },
                { "type": "mutated", "objectId": "0xkiosk", "objectType": "0x2::kiosk::Kiosk",
                  "owner": { "Shared": { "initial_shared_version": 7 } } },
                { "type": "published", "packageId": "0xpkg" }
            ],
            "balanceChanges": [
                { "owner": { "AddressOwner": "0xbuyer" }, "coinType": "0x2::sui::SUI", "amount": "-10" }
            ]
        }"#;
        let report = ExecutionReport::from_json(body).unwrap();
        assert_eq!(report.status, Some(ExecutionStatus::Success));
        let changes = report.object_changes.unwrap();
        assert_eq!(changes.len(), 3);
        assert!(matches!(changes[2], ObjectChange::Other));
        assert!(report.events.is_none());
        assert!(report.gas_used.is_none());
    }

    #[test]
    fn missing_status_still_parses() {
        // Strictness about status belongs to the extractor, not the parser.
        let report = ExecutionReport::from_json(r#"{ "digest": "abc" }"#).unwrap();
        assert!(report.status.is_none());
    }

    #[test]
    fn failure_status_carries_cause() {
        let report =
            ExecutionReport::from_json(r#"{ "status": { "status": "failure", "error": "MoveAbort(3)" } }"#)
                .unwrap();
        assert_eq!(
            report.status,
            Some(ExecutionStatus::Failure {
                error: Some("MoveAbort(3)".into())
            })
        );
    }

    #[test]
    fn invalid_json_is_serialization_error() {
        let err = ExecutionReport::from_json("{not json").unwrap_err();
        assert!(matches!(err, crate::TurnstileError::Serialization(_)));
    }

    #[test]
    fn net_fee_clamps_rebate() {
        let gas = GasSummary {
            computation_cost: 1_000,
            storage_cost: 2_000,
            storage_rebate: 500,
        };
        assert_eq!(gas.net_fee(), Some(2_500));
        let generous = GasSummary {
            computation_cost: 1,
            storage_cost: 1,
            storage_rebate: 10,
        };
        assert_eq!(generous.net_fee(), Some(0));
    }

    #[test]
    fn net_fee_overflow_is_none() {
        let report = ExecutionReport::from_json(
            r#"{ "status": { "status": "success" },
                 "gasUsed": { "computationCost": 18446744073709551615, "storageCost": 1, "storageRebate": 0 } }"#,
        )
        .unwrap();
        assert_eq!(report.gas_used.unwrap().net_fee(), None);
    }
}
