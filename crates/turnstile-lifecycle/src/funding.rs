//! Bounded wait for an address to be funded.

use std::thread;

use turnstile_types::{Address, Result, RetryPolicy, TurnstileError};

use crate::ledger::LedgerClient;

/// Poll `ledger` until `address` holds at least `minimum` of `coin_type`
/// (native coin when `None`). Returns the observed balance.
///
/// Sleeps [`RetryPolicy::delay_for`] between attempts. A transiently
/// unavailable ledger counts as a failed attempt; any other error is
/// returned immediately.
///
/// # Errors
/// Returns [`TurnstileError::FundingTimeout`] once `max_attempts` polls have
/// all come up short.
pub fn wait_for_balance<L: LedgerClient + ?Sized>(
    ledger: &L,
    address: &Address,
    minimum: u64,
    coin_type: Option<&str>,
    policy: &RetryPolicy,
) -> Result<u64> {
    for attempt in 0..policy.max_attempts {
        let delay = policy.delay_for(attempt);
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        match ledger.get_balance(address, coin_type) {
            Ok(balance) if balance >= minimum => {
                tracing::info!(
                    address = %address.short(),
                    balance,
                    attempts = attempt + 1,
                    "Funding observed"
                );
                return Ok(balance);
            }
            Ok(balance) => {
                tracing::debug!(address = %address.short(), balance, minimum, attempt, "Awaiting funds");
            }
            Err(TurnstileError::LedgerUnavailable { reason }) => {
                tracing::debug!(address = %address.short(), %reason, attempt, "Balance query failed");
            }
            Err(e) => return Err(e),
        }
    }
    tracing::warn!(
        address = %address.short(),
        minimum,
        attempts = policy.max_attempts,
        "Funding wait timed out"
    );
    Err(TurnstileError::FundingTimeout {
        address: address.clone(),
        minimum,
        attempts: policy.max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;

    use turnstile_compose::Batch;
    use turnstile_types::{ExecutionReport, ObjectId, ObjectSnapshot};

    use super::*;
    use crate::ledger::{ReportOptions, Signer};

    /// Returns scripted balance responses, then repeats the last one.
    struct ScriptedLedger {
        responses: RefCell<VecDeque<Result<u64>>>,
        polls: Cell<u32>,
    }

    impl ScriptedLedger {
        fn new(responses: Vec<Result<u64>>) -> Self {
            Self {
                responses: RefCell::new(responses.into()),
                polls: Cell::new(0),
            }
        }
    }

    impl LedgerClient for ScriptedLedger {
        fn submit(&self, _: &Batch, _: &dyn Signer, _: ReportOptions) -> Result<ExecutionReport> {
            unimplemented!("not used by funding tests")
        }

        fn get_balance(&self, _: &Address, _: Option<&str>) -> Result<u64> {
            self.polls.set(self.polls.get() + 1);
            let mut responses = self.responses.borrow_mut();
            if responses.len() > 1 {
                responses.pop_front().unwrap()
            } else {
                match responses.front().unwrap() {
                    Ok(b) => Ok(*b),
                    Err(_) => Err(TurnstileError::LedgerUnavailable {
                        reason: "down".into(),
                    }),
                }
            }
        }

        fn get_object(&self, _: &ObjectId) -> Result<ObjectSnapshot> {
            unimplemented!("not used by funding tests")
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            interval_ms: 0,
            max_attempts,
            backoff_multiplier: 2,
            max_interval_ms: 0,
        }
    }

    #[test]
    fn returns_once_funded() {
        let ledger = ScriptedLedger::new(vec![Ok(0), Ok(10), Ok(1_000)]);
        let balance =
            wait_for_balance(&ledger, &Address::new("0xa"), 500, None, &fast_policy(5)).unwrap();
        assert_eq!(balance, 1_000);
        assert_eq!(ledger.polls.get(), 3);
    }

    #[test]
    fn transient_errors_count_as_attempts() {
        let ledger = ScriptedLedger::new(vec![
            Err(TurnstileError::LedgerUnavailable {
                reason: "timeout".into(),
            }),
            Ok(600),
        ]);
        let balance =
            wait_for_balance(&ledger, &Address::new("0xa"), 500, None, &fast_policy(3)).unwrap();
        assert_eq!(balance, 600);
    }

    #[test]
    fn times_out_after_max_attempts() {
        let ledger = ScriptedLedger::new(vec![Ok(0)]);
        let err =
            wait_for_balance(&ledger, &Address::new("0xa"), 1, None, &fast_policy(4)).unwrap_err();
        assert!(matches!(err, TurnstileError::FundingTimeout { attempts: 4, .. }));
        assert!(err.is_retryable());
        assert_eq!(ledger.polls.get(), 4);
    }

    #[test]
    fn other_errors_abort() {
        let ledger = ScriptedLedger::new(vec![Err(TurnstileError::Internal("boom".into())), Ok(9)]);
        assert!(matches!(
            wait_for_balance(&ledger, &Address::new("0xa"), 1, None, &fast_policy(4)),
            Err(TurnstileError::Internal(_))
        ));
    }
}
