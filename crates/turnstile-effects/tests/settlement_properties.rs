//! Property tests for effects extraction and settlement conservation.

use proptest::prelude::*;
use turnstile_effects::{Reconciler, extract};
use turnstile_types::{ExecutionReport, ObjectId, ProtocolConfig, TurnstileError};

const SUI: &str = "0x2::sui::SUI";

fn config() -> ProtocolConfig {
    ProtocolConfig::new(ObjectId::new("0xpkg"))
}

/// Build a report whose balance changes pay `amounts` to distinct owners and
/// debit their sum (plus `fee`) from a single payer.
fn balanced_report(amounts: &[u32], fee: u64) -> ExecutionReport {
    let total: i128 = amounts.iter().map(|a| i128::from(*a)).sum::<i128>() + i128::from(fee);
    let mut report = ExecutionReport::dummy_success()
        .with_balance_change("0xpayer", SUI, -total)
        .with_gas(fee, 0, 0);
    for (i, amount) in amounts.iter().enumerate() {
        report = report.with_balance_change(&format!("0xpayee{i}"), SUI, i128::from(*amount));
    }
    report
}

proptest! {
    #[test]
    fn balanced_settlements_conserve(
        amounts in prop::collection::vec(0u32..1_000_000, 0..8),
        fee in 0u64..100_000,
    ) {
        let cfg = config();
        let fx = extract(&balanced_report(&amounts, fee)).unwrap();
        prop_assert!(Reconciler::new(&cfg).check_conservation(&fx).is_ok());
    }

    #[test]
    fn zero_sum_settlements_conserve_whatever_the_fee(
        amounts in prop::collection::vec(0u32..1_000_000, 0..8),
        computation in 0u64..100_000,
        storage in 0u64..100_000,
    ) {
        let cfg = config();
        let report = balanced_report(&amounts, 0).with_gas(computation, storage, 0);
        let fx = extract(&report).unwrap();
        prop_assert!(Reconciler::new(&cfg).check_conservation(&fx).is_ok());
    }

    #[test]
    fn any_leak_is_detected(
        amounts in prop::collection::vec(0u32..1_000_000, 1..8),
        leak in prop_oneof![-1_000i128..0, 1i128..1_000],
    ) {
        let cfg = config();
        let report = balanced_report(&amounts, 0).with_balance_change("0xleak", SUI, leak);
        let fx = extract(&report).unwrap();
        let is_mismatch = matches!(
            Reconciler::new(&cfg).check_conservation(&fx),
            Err(TurnstileError::SettlementMismatch { .. })
        );
        prop_assert!(is_mismatch);
    }

    #[test]
    fn created_of_preserves_report_order(
        kinds in prop::collection::vec(prop_oneof![Just("Ticket"), Just("Event"), Just("Coin")], 0..12),
    ) {
        let mut report = ExecutionReport::dummy_success();
        for (i, kind) in kinds.iter().enumerate() {
            report = report.with_created(&format!("0x{i:x}"), &format!("0xpkg::ticketing::{kind}"), None);
        }
        let fx = extract(&report).unwrap();

        let expected: Vec<ObjectId> = kinds
            .iter()
            .enumerate()
            .filter(|(_, kind)| **kind == "Ticket")
            .map(|(i, _)| ObjectId::new(format!("0x{i:x}")))
            .collect();
        let found: Vec<ObjectId> = fx.created_of("Ticket").into_iter().cloned().collect();
        prop_assert_eq!(found, expected);
    }
}
