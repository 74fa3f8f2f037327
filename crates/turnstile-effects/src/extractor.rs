//! Effects extraction: raw [`ExecutionReport`] → [`TypedEffects`].
//!
//! The extractor is strict about exactly one thing, the execution status.
//! A report without a status is rejected as malformed. Everything else is
//! optional: sections the node did not report become [`Section::Omitted`],
//! entries missing their id are skipped, and lookups return empty/`None`
//! rather than failing. A balance amount that is present but not an
//! integer is still malformed, since silently dropping it would falsify
//! the conservation check downstream.

use serde::Serialize;
use turnstile_types::{
    Address, EmittedEvent, ExecutionReport, ExecutionStatus, ObjectChange, ObjectId, Owner,
    Result, TurnstileError, TypeTagPatterns,
};

use crate::tag::TagMatcher;

/// A report section that the ledger node may or may not have included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Section<T> {
    Reported(T),
    Omitted,
}

impl<T> Section<T> {
    #[must_use]
    pub fn reported(&self) -> Option<&T> {
        match self {
            Self::Reported(v) => Some(v),
            Self::Omitted => None,
        }
    }

    #[must_use]
    pub fn is_omitted(&self) -> bool {
        matches!(self, Self::Omitted)
    }
}

/// An object created or mutated by the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectEffect {
    pub id: ObjectId,
    pub object_type: Option<String>,
    pub owner: Option<Owner>,
}

/// A signed balance delta attributed to one owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settlement {
    pub owner: Option<Owner>,
    /// `None` when the node omitted the coin type; treated as the native coin.
    pub coin_type: Option<String>,
    pub amount: i128,
}

impl Settlement {
    /// The receiving/paying account, if the owner is an address.
    #[must_use]
    pub fn address(&self) -> Option<&Address> {
        self.owner.as_ref().and_then(Owner::address)
    }
}

/// Normalized, read-only view of one execution report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypedEffects {
    pub digest: Option<String>,
    pub status: ExecutionStatus,
    /// Created objects in report order.
    pub created: Section<Vec<ObjectEffect>>,
    /// Mutated objects in report order.
    pub mutated: Section<Vec<ObjectEffect>>,
    pub deleted: Section<Vec<ObjectId>>,
    pub settlements: Section<Vec<Settlement>>,
    pub events: Section<Vec<EmittedEvent>>,
    /// Net network fee; zero when the report carries no gas summary.
    pub network_fee: u64,
}

/// Build [`TypedEffects`] from a raw report.
///
/// # Errors
/// Returns [`TurnstileError::MalformedReport`] if the status is absent or a
/// balance amount is not a signed integer.
pub fn extract(report: &ExecutionReport) -> Result<TypedEffects> {
    let status = report
        .status
        .clone()
        .ok_or_else(|| TurnstileError::malformed("execution status is absent"))?;

    let (created, mutated, deleted) = match &report.object_changes {
        Some(changes) => {
            let (c, m, d) = split_object_changes(changes);
            (
                Section::Reported(c),
                Section::Reported(m),
                Section::Reported(d),
            )
        }
        None => (Section::Omitted, Section::Omitted, Section::Omitted),
    };

    let settlements = match &report.balance_changes {
        Some(changes) => {
            let mut out = Vec::with_capacity(changes.len());
            for change in changes {
                let Some(raw) = change.amount.as_deref() else {
                    tracing::trace!(owner = ?change.owner, "Balance change without amount skipped");
                    continue;
                };
                let amount = raw.trim().parse::<i128>().map_err(|_| {
                    TurnstileError::malformed(format!("balance amount {raw:?} is not an integer"))
                })?;
                out.push(Settlement {
                    owner: change.owner.clone(),
                    coin_type: change.coin_type.clone(),
                    amount,
                });
            }
            Section::Reported(out)
        }
        None => Section::Omitted,
    };

    let events = report
        .events
        .clone()
        .map_or(Section::Omitted, Section::Reported);

    let network_fee = match report.gas_used {
        Some(gas) => gas
            .net_fee()
            .ok_or_else(|| TurnstileError::malformed("gas charges overflow u64"))?,
        None => 0,
    };

    Ok(TypedEffects {
        digest: report.digest.clone(),
        status,
        created,
        mutated,
        deleted,
        settlements,
        events,
        network_fee,
    })
}

fn owner_in<'s>(section: &'s Section<Vec<ObjectEffect>>, id: &ObjectId) -> Option<&'s Owner> {
    section
        .reported()
        .and_then(|objs| objs.iter().find(|o| &o.id == id))
        .and_then(|o| o.owner.as_ref())
}

fn split_object_changes(
    changes: &[ObjectChange],
) -> (Vec<ObjectEffect>, Vec<ObjectEffect>, Vec<ObjectId>) {
    let mut created = Vec::new();
    let mut mutated = Vec::new();
    let mut deleted = Vec::new();
    for change in changes {
        match change {
            ObjectChange::Created {
                object_id: Some(id),
                object_type,
                owner,
            } => created.push(ObjectEffect {
                id: id.clone(),
                object_type: object_type.clone(),
                owner: owner.clone(),
            }),
            ObjectChange::Mutated {
                object_id: Some(id),
                object_type,
                owner,
            } => mutated.push(ObjectEffect {
                id: id.clone(),
                object_type: object_type.clone(),
                owner: owner.clone(),
            }),
            ObjectChange::Deleted {
                object_id: Some(id),
                ..
            } => deleted.push(id.clone()),
            _ => tracing::trace!(?change, "Object change skipped"),
        }
    }
    (created, mutated, deleted)
}

impl TypedEffects {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// The ledger-reported failure cause, if execution failed.
    #[must_use]
    pub fn failure_cause(&self) -> Option<String> {
        match &self.status {
            ExecutionStatus::Success => None,
            ExecutionStatus::Failure { error } => Some(
                error
                    .clone()
                    .unwrap_or_else(|| "no cause reported".to_string()),
            ),
        }
    }

    /// # Errors
    /// Returns [`TurnstileError::LedgerExecutionFailure`] carrying the
    /// ledger's cause if the batch failed.
    pub fn ensure_success(&self) -> Result<()> {
        match self.failure_cause() {
            None => Ok(()),
            Some(cause) => Err(TurnstileError::LedgerExecutionFailure { cause }),
        }
    }

    /// Ids of created objects whose type tag satisfies `matcher`, in report order.
    #[must_use]
    pub fn created_matching(&self, matcher: TagMatcher<'_>) -> Vec<&ObjectId> {
        self.created
            .reported()
            .map(|objs| {
                objs.iter()
                    .filter(|o| o.object_type.as_deref().is_some_and(|t| matcher.matches(t)))
                    .map(|o| &o.id)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Ids of created objects whose type tag contains `tag`, in report order.
    #[must_use]
    pub fn created_of(&self, tag: &str) -> Vec<&ObjectId> {
        self.created_matching(TagMatcher::Contains(tag))
    }

    #[must_use]
    pub fn created_events(&self, patterns: &TypeTagPatterns) -> Vec<&ObjectId> {
        self.created_matching(TagMatcher::StructName(&patterns.event))
    }

    #[must_use]
    pub fn created_classes(&self, patterns: &TypeTagPatterns) -> Vec<&ObjectId> {
        self.created_matching(TagMatcher::StructName(&patterns.class))
    }

    #[must_use]
    pub fn created_tickets(&self, patterns: &TypeTagPatterns) -> Vec<&ObjectId> {
        self.created_matching(TagMatcher::StructName(&patterns.ticket))
    }

    #[must_use]
    pub fn created_escrows(&self, patterns: &TypeTagPatterns) -> Vec<&ObjectId> {
        self.created_matching(TagMatcher::StructName(&patterns.escrow))
    }

    /// Owner recorded for `id` by this batch. Mutations win over creations
    /// when both are present.
    #[must_use]
    pub fn owner_of(&self, id: &ObjectId) -> Option<&Owner> {
        owner_in(&self.mutated, id).or_else(|| owner_in(&self.created, id))
    }

    /// The address now owning `id`, if it changed hands to an address.
    #[must_use]
    pub fn new_owner_of(&self, id: &ObjectId) -> Option<&Address> {
        self.owner_of(id).and_then(Owner::address)
    }

    #[must_use]
    pub fn was_mutated(&self, id: &ObjectId) -> bool {
        self.mutated
            .reported()
            .is_some_and(|objs| objs.iter().any(|o| &o.id == id))
    }

    #[must_use]
    pub fn was_deleted(&self, id: &ObjectId) -> bool {
        self.deleted.reported().is_some_and(|ids| ids.contains(id))
    }

    /// Events whose type tag contains `tag`, in report order.
    #[must_use]
    pub fn events_of(&self, tag: &str) -> Vec<&EmittedEvent> {
        self.events
            .reported()
            .map(|events| {
                events
                    .iter()
                    .filter(|e| e.event_type.as_deref().is_some_and(|t| t.contains(tag)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Reported settlements, or an empty slice when omitted.
    #[must_use]
    pub fn settlement_records(&self) -> &[Settlement] {
        self.settlements
            .reported()
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}
