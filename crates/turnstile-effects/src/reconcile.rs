//! Balance / royalty reconciliation.
//!
//! Checks run against one [`TypedEffects`], in this order:
//!
//! ```text
//! 1. conservation   ∀ coin: Σ credits == Σ debits, or for the native
//!                   coin Σ credits + fee == Σ debits                  (fatal)
//! 2. payer spend    expected ≤ −Δpayer ≤ expected + fee_allowance     (fatal)
//! 3. royalty        sale ⇒ some settlement pays the royalty recipient (soft)
//! ```
//!
//! A conservation failure means the report is malformed or the ledger did
//! something unexpected; callers should halt rather than continue. A missing
//! royalty payment is only a warning because some classes legitimately
//! carry no royalty rule.

use std::collections::BTreeMap;

use serde::Serialize;
use turnstile_types::{Address, ProtocolConfig, Result, TurnstileError};

use crate::extractor::{Settlement, TypedEffects};

/// A payer's balance before submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceSnapshot {
    pub address: Address,
    /// Native-coin balance in minor units.
    pub balance: u64,
}

/// What the payer is expected to spend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SpendExpectation {
    /// Spend excluding network fees.
    pub expected_spend: u64,
    /// Present when the batch is a sale subject to royalty.
    pub sale_price: Option<u64>,
}

impl SpendExpectation {
    /// Only network fees are expected (mint, list, check-in, setup).
    #[must_use]
    pub fn fees_only() -> Self {
        Self {
            expected_spend: 0,
            sale_price: None,
        }
    }

    #[must_use]
    pub fn sale(price: u64) -> Self {
        Self {
            expected_spend: price,
            sale_price: Some(price),
        }
    }
}

/// Non-fatal observations surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SettlementWarning {
    /// A royalty is configured but no settlement credits its recipient.
    RoyaltyNotObserved { recipient: Address, expected: u64 },
    /// The node omitted balance changes; nothing could be verified.
    SettlementsNotReported,
}

/// Royalty expected versus observed for one sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoyaltyObservation {
    pub recipient: Address,
    pub expected: u64,
    pub observed: u128,
}

/// Result of a successful reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    pub payer: Address,
    /// Signed native-coin delta of the payer. `None` if settlements were omitted.
    pub payer_delta: Option<i128>,
    /// Pre-balance plus delta.
    pub implied_balance: Option<u64>,
    pub network_fee: u64,
    pub royalty: Option<RoyaltyObservation>,
    pub warnings: Vec<SettlementWarning>,
}

impl Reconciliation {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Cross-checks settlement records against expectations.
#[derive(Debug, Clone, Copy)]
pub struct Reconciler<'a> {
    config: &'a ProtocolConfig,
}

impl<'a> Reconciler<'a> {
    #[must_use]
    pub fn new(config: &'a ProtocolConfig) -> Self {
        Self { config }
    }

    fn coin_of<'s>(&'s self, settlement: &'s Settlement) -> &'s str {
        settlement
            .coin_type
            .as_deref()
            .unwrap_or(&self.config.coin_type)
    }

    /// Verify that no value was created or destroyed, per coin type.
    ///
    /// Every coin type must balance exactly. The native coin may instead
    /// balance once the network fee is added to the credits, for ledgers
    /// that report the fee inside the payer's settlement.
    ///
    /// # Errors
    /// - [`TurnstileError::SettlementMismatch`] for the first coin type that
    ///   does not balance
    /// - [`TurnstileError::MalformedReport`] if the totals overflow
    pub fn check_conservation(&self, effects: &TypedEffects) -> Result<()> {
        // coin type → (credits, debits)
        let mut totals: BTreeMap<&str, (u128, u128)> = BTreeMap::new();
        for s in effects.settlement_records() {
            let entry = totals.entry(self.coin_of(s)).or_default();
            let side = if s.amount >= 0 {
                &mut entry.0
            } else {
                &mut entry.1
            };
            *side = side
                .checked_add(s.amount.unsigned_abs())
                .ok_or_else(|| TurnstileError::malformed("settlement totals overflow u128"))?;
        }

        for (coin_type, (credits, debits)) in totals {
            if credits == debits {
                continue;
            }
            let fee = if coin_type == self.config.coin_type {
                effects.network_fee
            } else {
                0
            };
            if fee > 0 && credits.checked_add(u128::from(fee)) == Some(debits) {
                continue;
            }
            tracing::error!(
                coin_type,
                credits,
                debits,
                fee,
                digest = ?effects.digest,
                "Settlement conservation violated"
            );
            return Err(TurnstileError::SettlementMismatch {
                coin_type: coin_type.to_string(),
                credits,
                debits,
                fee,
            });
        }
        Ok(())
    }

    /// Native-coin delta attributed to `address`.
    #[must_use]
    pub fn delta_of(&self, effects: &TypedEffects, address: &Address) -> i128 {
        effects
            .settlement_records()
            .iter()
            .filter(|s| s.address() == Some(address) && self.coin_of(s) == self.config.coin_type)
            .fold(0_i128, |acc, s| acc.saturating_add(s.amount))
    }

    /// Run all checks.
    ///
    /// # Errors
    /// - [`TurnstileError::SettlementMismatch`] if conservation fails
    /// - [`TurnstileError::UnexpectedSpend`] if the payer spent less than
    ///   expected, more than expected plus the fee allowance, or more than
    ///   they held
    pub fn reconcile(
        &self,
        pre: &BalanceSnapshot,
        effects: &TypedEffects,
        expectation: SpendExpectation,
    ) -> Result<Reconciliation> {
        if effects.settlements.is_omitted() {
            tracing::warn!(
                payer = %pre.address.short(),
                digest = ?effects.digest,
                "Balance changes omitted from report; settlement not verified"
            );
            return Ok(Reconciliation {
                payer: pre.address.clone(),
                payer_delta: None,
                implied_balance: None,
                network_fee: effects.network_fee,
                royalty: None,
                warnings: vec![SettlementWarning::SettlementsNotReported],
            });
        }

        self.check_conservation(effects)?;

        let delta = self.delta_of(effects, &pre.address);
        let spent = delta.saturating_neg();
        let ceiling = expectation
            .expected_spend
            .saturating_add(self.config.fee_allowance);
        let implied = i128::from(pre.balance).saturating_add(delta);
        if spent < i128::from(expectation.expected_spend)
            || spent > i128::from(ceiling)
            || implied < 0
        {
            return Err(TurnstileError::UnexpectedSpend {
                payer: pre.address.clone(),
                expected: expectation.expected_spend,
                ceiling,
                observed: spent,
            });
        }

        let mut warnings = Vec::new();
        let royalty = match (&self.config.royalty, expectation.sale_price) {
            (Some(cfg), Some(price)) => {
                let observed: u128 = effects
                    .settlement_records()
                    .iter()
                    .filter(|s| s.address() == Some(&cfg.recipient) && s.amount > 0)
                    .fold(0_u128, |acc, s| acc.saturating_add(s.amount.unsigned_abs()));
                let expected = cfg.royalty_for(price);
                if observed == 0 {
                    tracing::warn!(
                        recipient = %cfg.recipient.short(),
                        expected,
                        digest = ?effects.digest,
                        "Royalty payment not observed in settlements"
                    );
                    warnings.push(SettlementWarning::RoyaltyNotObserved {
                        recipient: cfg.recipient.clone(),
                        expected,
                    });
                }
                Some(RoyaltyObservation {
                    recipient: cfg.recipient.clone(),
                    expected,
                    observed,
                })
            }
            _ => None,
        };

        Ok(Reconciliation {
            payer: pre.address.clone(),
            payer_delta: Some(delta),
            // implied >= 0 checked above and <= pre.balance + credits.
            implied_balance: u64::try_from(implied).ok(),
            network_fee: effects.network_fee,
            royalty,
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use turnstile_types::{ExecutionReport, ObjectId};

    use super::*;
    use crate::extractor::extract;

    const SUI: &str = "0x2::sui::SUI";
    const PRICE: u64 = 250_000_000;

    fn config() -> ProtocolConfig {
        ProtocolConfig::new(ObjectId::new("0xpkg")).with_royalty(Address::new("0xartist"), 1_000)
    }

    fn buyer_snapshot() -> BalanceSnapshot {
        BalanceSnapshot {
            address: Address::new("0xbuyer"),
            balance: 1_000_000_000,
        }
    }

    fn sale_report() -> ExecutionReport {
        ExecutionReport::dummy_success()
            .with_balance_change("0xbuyer", SUI, -250_000_000)
            .with_balance_change("0xseller", SUI, 225_000_000)
            .with_balance_change("0xartist", SUI, 25_000_000)
    }

    #[test]
    fn royalty_sale_reconciles_cleanly() {
        let cfg = config();
        let fx = extract(&sale_report()).unwrap();
        let rec = Reconciler::new(&cfg)
            .reconcile(&buyer_snapshot(), &fx, SpendExpectation::sale(PRICE))
            .unwrap();
        assert!(rec.is_clean(), "warnings: {:?}", rec.warnings);
        assert_eq!(rec.payer_delta, Some(-250_000_000));
        assert_eq!(rec.implied_balance, Some(750_000_000));
        let royalty = rec.royalty.unwrap();
        assert_eq!(royalty.expected, 25_000_000);
        assert_eq!(royalty.observed, 25_000_000);
    }

    #[test]
    fn sale_with_network_fee_reconciles() {
        let cfg = config();
        let report = ExecutionReport::dummy_success()
            .with_balance_change("0xbuyer", SUI, -251_000_000)
            .with_balance_change("0xseller", SUI, 225_000_000)
            .with_balance_change("0xartist", SUI, 25_000_000)
            .with_gas(800_000, 400_000, 200_000);
        let fx = extract(&report).unwrap();
        let rec = Reconciler::new(&cfg)
            .reconcile(&buyer_snapshot(), &fx, SpendExpectation::sale(PRICE))
            .unwrap();
        assert_eq!(rec.network_fee, 1_000_000);
        assert_eq!(rec.payer_delta, Some(-251_000_000));
    }

    #[test]
    fn value_created_is_fatal() {
        let cfg = config();
        let report = sale_report().with_balance_change("0xmallory", SUI, 1);
        let fx = extract(&report).unwrap();
        let err = Reconciler::new(&cfg)
            .reconcile(&buyer_snapshot(), &fx, SpendExpectation::sale(PRICE))
            .unwrap_err();
        assert!(matches!(err, TurnstileError::SettlementMismatch { .. }));
        assert!(err.is_integrity_violation());
    }

    #[test]
    fn zero_sum_with_gas_summary_reconciles() {
        let cfg = config();
        let report = sale_report().with_gas(1_000, 0, 0);
        let fx = extract(&report).unwrap();
        assert!(Reconciler::new(&cfg).check_conservation(&fx).is_ok());
        let rec = Reconciler::new(&cfg)
            .reconcile(&buyer_snapshot(), &fx, SpendExpectation::sale(PRICE))
            .unwrap();
        assert_eq!(rec.network_fee, 1_000);
        assert_eq!(rec.payer_delta, Some(-250_000_000));
    }

    #[test]
    fn fee_allowance_does_not_hide_other_leaks() {
        let cfg = config();
        // Debits exceed credits by more than the reported fee.
        let report = sale_report()
            .with_balance_change("0xbuyer", SUI, -5_000)
            .with_gas(1_000, 0, 0);
        let fx = extract(&report).unwrap();
        assert!(matches!(
            Reconciler::new(&cfg).check_conservation(&fx),
            Err(TurnstileError::SettlementMismatch { fee: 1_000, .. })
        ));
    }

    #[test]
    fn overflowing_totals_are_malformed_not_a_panic() {
        let cfg = config();
        let report = ExecutionReport::dummy_success()
            .with_balance_change("0xa", SUI, i128::MAX)
            .with_balance_change("0xb", SUI, i128::MAX)
            .with_balance_change("0xc", SUI, i128::MAX)
            .with_balance_change("0xd", SUI, i128::MAX)
            .with_balance_change("0xe", SUI, i128::MAX);
        let fx = extract(&report).unwrap();
        let err = Reconciler::new(&cfg).check_conservation(&fx).unwrap_err();
        assert!(matches!(err, TurnstileError::MalformedReport { .. }));
    }

    #[test]
    fn conservation_is_per_coin_type() {
        let cfg = ProtocolConfig::new(ObjectId::new("0xpkg"));
        let report = ExecutionReport::dummy_success()
            .with_balance_change("0xa", "0xusdc::usdc::USDC", -10)
            .with_balance_change("0xb", SUI, 10);
        let fx = extract(&report).unwrap();
        assert!(matches!(
            Reconciler::new(&cfg).check_conservation(&fx),
            Err(TurnstileError::SettlementMismatch { .. })
        ));
    }

    #[test]
    fn missing_royalty_is_only_a_warning() {
        let cfg = config();
        let report = ExecutionReport::dummy_success()
            .with_balance_change("0xbuyer", SUI, -250_000_000)
            .with_balance_change("0xseller", SUI, 250_000_000);
        let fx = extract(&report).unwrap();
        let rec = Reconciler::new(&cfg)
            .reconcile(&buyer_snapshot(), &fx, SpendExpectation::sale(PRICE))
            .unwrap();
        assert_eq!(
            rec.warnings,
            vec![SettlementWarning::RoyaltyNotObserved {
                recipient: Address::new("0xartist"),
                expected: 25_000_000,
            }]
        );
    }

    #[test]
    fn no_royalty_check_without_config() {
        let cfg = ProtocolConfig::new(ObjectId::new("0xpkg"));
        let report = ExecutionReport::dummy_success()
            .with_balance_change("0xbuyer", SUI, -250_000_000)
            .with_balance_change("0xseller", SUI, 250_000_000);
        let fx = extract(&report).unwrap();
        let rec = Reconciler::new(&cfg)
            .reconcile(&buyer_snapshot(), &fx, SpendExpectation::sale(PRICE))
            .unwrap();
        assert!(rec.is_clean());
        assert!(rec.royalty.is_none());
    }

    #[test]
    fn underpayment_is_unexpected_spend() {
        let cfg = config();
        let report = ExecutionReport::dummy_success()
            .with_balance_change("0xbuyer", SUI, -100)
            .with_balance_change("0xseller", SUI, 100);
        let fx = extract(&report).unwrap();
        let err = Reconciler::new(&cfg)
            .reconcile(&buyer_snapshot(), &fx, SpendExpectation::sale(PRICE))
            .unwrap_err();
        assert!(matches!(err, TurnstileError::UnexpectedSpend { .. }));
    }

    #[test]
    fn overspend_beyond_allowance_is_unexpected_spend() {
        let cfg = config();
        let over = i128::from(PRICE + cfg.fee_allowance + 1);
        let report = ExecutionReport::dummy_success()
            .with_balance_change("0xbuyer", SUI, -over)
            .with_balance_change("0xseller", SUI, over);
        let fx = extract(&report).unwrap();
        assert!(matches!(
            Reconciler::new(&cfg).reconcile(&buyer_snapshot(), &fx, SpendExpectation::sale(PRICE)),
            Err(TurnstileError::UnexpectedSpend { .. })
        ));
    }

    #[test]
    fn spend_beyond_balance_is_unexpected_spend() {
        let cfg = ProtocolConfig::new(ObjectId::new("0xpkg"));
        let report = ExecutionReport::dummy_success()
            .with_balance_change("0xbuyer", SUI, -250_000_000)
            .with_balance_change("0xseller", SUI, 250_000_000);
        let fx = extract(&report).unwrap();
        let poor = BalanceSnapshot {
            address: Address::new("0xbuyer"),
            balance: 1_000,
        };
        assert!(matches!(
            Reconciler::new(&cfg).reconcile(&poor, &fx, SpendExpectation::sale(PRICE)),
            Err(TurnstileError::UnexpectedSpend { .. })
        ));
    }

    #[test]
    fn omitted_settlements_warn() {
        let cfg = config();
        let report = ExecutionReport {
            balance_changes: None,
            ..ExecutionReport::dummy_success()
        };
        let fx = extract(&report).unwrap();
        let rec = Reconciler::new(&cfg)
            .reconcile(&buyer_snapshot(), &fx, SpendExpectation::sale(PRICE))
            .unwrap();
        assert_eq!(rec.warnings, vec![SettlementWarning::SettlementsNotReported]);
        assert!(rec.payer_delta.is_none());
    }

    #[test]
    fn fee_only_check_in() {
        let cfg = ProtocolConfig::new(ObjectId::new("0xpkg"));
        let report = ExecutionReport::dummy_success()
            .with_balance_change("0xholder", SUI, -2_000)
            .with_gas(1_500, 500, 0);
        let fx = extract(&report).unwrap();
        let snapshot = BalanceSnapshot {
            address: Address::new("0xholder"),
            balance: 10_000,
        };
        let rec = Reconciler::new(&cfg)
            .reconcile(&snapshot, &fx, SpendExpectation::fees_only())
            .unwrap();
        assert_eq!(rec.implied_balance, Some(8_000));
        assert!(rec.royalty.is_none());
    }
}
