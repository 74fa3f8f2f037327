//! Error types for the Turnstile lifecycle engine.
//!
//! All errors use the `TS_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Batch composition errors
//! - 2xx: Lifecycle precondition errors
//! - 3xx: Execution report errors
//! - 4xx: Ledger errors
//! - 5xx: Settlement errors
//! - 9xx: General / internal errors
//!
//! Composition (1xx) and precondition (2xx) errors are always raised before
//! anything is submitted to the ledger.

use thiserror::Error;

use crate::{Address, ObjectId, TicketState, Transition};

/// Central error enum for all Turnstile operations.
#[derive(Debug, Error)]
pub enum TurnstileError {
    // =================================================================
    // Composition Errors (1xx)
    // =================================================================
    /// An argument references an output that does not exist or was already moved.
    #[error("TS_ERR_100: Unresolved reference in operation {operation}: {reason}")]
    UnresolvedReference { operation: usize, reason: String },

    /// A literal argument or descriptor field failed validation.
    #[error("TS_ERR_101: Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    /// A batch was finished without any operations.
    #[error("TS_ERR_102: Batch contains no operations")]
    EmptyBatch,

    // =================================================================
    // Lifecycle Errors (2xx)
    // =================================================================
    /// The transition is not legal from the ticket's current state.
    #[error("TS_ERR_200: Illegal transition {transition} from state {from}")]
    IllegalTransition {
        transition: Transition,
        from: TicketState,
    },

    /// Minting would exceed the class supply.
    #[error("TS_ERR_201: Supply exhausted for class {class}: all {supply} tickets issued")]
    SupplyExhausted { class: ObjectId, supply: u64 },

    /// The ticket's `used` flag is already set.
    #[error("TS_ERR_202: Ticket already checked in: {0}")]
    AlreadyCheckedIn(ObjectId),

    /// The caller does not hold the ticket.
    #[error("TS_ERR_203: Caller {caller} is not the holder {holder}")]
    NotHolder { caller: Address, holder: Address },

    /// Payment offered is below the class face price.
    #[error("TS_ERR_204: Insufficient payment: need {needed}, offered {offered}")]
    InsufficientPayment { needed: u64, offered: u64 },

    /// A purchase batch does not confirm its transfer request before transfer.
    #[error("TS_ERR_205: Transfer policy not confirmed: {reason}")]
    PolicyNotConfirmed { reason: String },

    /// A local ticket record was asked to move backwards or skip a state.
    #[error("TS_ERR_206: Ticket {ticket} cannot move from {from} to {to}")]
    InvalidTicketState {
        ticket: ObjectId,
        from: TicketState,
        to: TicketState,
    },

    // =================================================================
    // Report Errors (3xx)
    // =================================================================
    /// The execution report lacks a mandatory field or carries garbage.
    #[error("TS_ERR_300: Malformed execution report: {reason}")]
    MalformedReport { reason: String },

    // =================================================================
    // Ledger Errors (4xx)
    // =================================================================
    /// The ledger executed the batch and reported failure. Nothing took effect.
    #[error("TS_ERR_400: Ledger execution failed: {cause}")]
    LedgerExecutionFailure { cause: String },

    /// The ledger client could not be reached or timed out.
    #[error("TS_ERR_401: Ledger unavailable: {reason}")]
    LedgerUnavailable { reason: String },

    /// A bounded funding wait gave up.
    #[error("TS_ERR_402: Funding timeout: {address} still below {minimum} after {attempts} attempts")]
    FundingTimeout {
        address: Address,
        minimum: u64,
        attempts: u32,
    },

    // =================================================================
    // Settlement Errors (5xx)
    // =================================================================
    /// Value was created or destroyed by the batch. Critical integrity alert.
    #[error(
        "TS_ERR_500: Settlement mismatch for {coin_type}: credits {credits} + fee {fee} != debits {debits}"
    )]
    SettlementMismatch {
        coin_type: String,
        credits: u128,
        debits: u128,
        fee: u64,
    },

    /// The payer's balance moved outside the expected spend window.
    #[error(
        "TS_ERR_501: Unexpected spend by {payer}: expected between {expected} and {ceiling}, observed {observed}"
    )]
    UnexpectedSpend {
        payer: Address,
        expected: u64,
        ceiling: u64,
        observed: i128,
    },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("TS_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("TS_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (invalid config file, missing fields, etc.).
    #[error("TS_ERR_902: Configuration error: {0}")]
    Configuration(String),

    /// The key custody provider failed to sign.
    #[error("TS_ERR_903: Signing error: {0}")]
    Signing(String),

    /// I/O error.
    #[error("TS_ERR_904: I/O error: {0}")]
    Io(String),
}

impl TurnstileError {
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedReport {
            reason: reason.into(),
        }
    }

    /// Whether the caller may retry with a fresh batch.
    ///
    /// Composition, precondition, report and settlement errors are never
    /// retryable: resubmitting the same input gives the same answer.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::LedgerExecutionFailure { .. }
                | Self::LedgerUnavailable { .. }
                | Self::FundingTimeout { .. }
        )
    }

    /// Whether the error signals an integrity problem that should halt the caller.
    #[must_use]
    pub fn is_integrity_violation(&self) -> bool {
        matches!(
            self,
            Self::SettlementMismatch { .. } | Self::MalformedReport { .. }
        )
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, TurnstileError>;

impl From<std::io::Error> for TurnstileError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for TurnstileError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for TurnstileError {
    fn from(err: toml::de::Error) -> Self {
        Self::Configuration(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// TransitionError
// ---------------------------------------------------------------------------

/// A failure attributed to one attempted lifecycle transition.
///
/// Every error leaving the orchestrator is wrapped in this so callers can
/// always tell which transition failed, on which asset, and why.
#[derive(Debug, Error)]
#[error("{transition} on {}: {kind}", .asset.as_ref().map_or("<new asset>", ObjectId::as_str))]
pub struct TransitionError {
    pub transition: Transition,
    /// `None` for transitions that create the asset (mint, setup operations).
    pub asset: Option<ObjectId>,
    #[source]
    pub kind: TurnstileError,
}

impl TransitionError {
    pub fn new(transition: Transition, asset: Option<&ObjectId>, kind: TurnstileError) -> Self {
        Self {
            transition,
            asset: asset.cloned(),
            kind,
        }
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_contains_prefix() {
        let err = TurnstileError::AlreadyCheckedIn(ObjectId::new("0xt"));
        let msg = format!("{err}");
        assert!(msg.starts_with("TS_ERR_202"), "Got: {msg}");
    }

    #[test]
    fn settlement_mismatch_display() {
        let err = TurnstileError::SettlementMismatch {
            coin_type: "0x2::sui::SUI".into(),
            credits: 100,
            debits: 90,
            fee: 0,
        };
        let msg = format!("{err}");
        assert!(msg.contains("TS_ERR_500"));
        assert!(msg.contains("100"));
        assert!(msg.contains("90"));
    }

    #[test]
    fn illegal_transition_display() {
        let err = TurnstileError::IllegalTransition {
            transition: Transition::CheckIn,
            from: TicketState::Listed,
        };
        let msg = format!("{err}");
        assert!(msg.contains("checkIn"));
        assert!(msg.contains("LISTED"));
    }

    #[test]
    fn all_errors_have_ts_err_prefix() {
        let errors: Vec<Box<dyn std::error::Error>> = vec![
            Box::new(TurnstileError::EmptyBatch),
            Box::new(TurnstileError::invalid_argument("x")),
            Box::new(TurnstileError::malformed("no status")),
            Box::new(TurnstileError::Internal("test".into())),
            Box::new(TurnstileError::PolicyNotConfirmed {
                reason: "missing".into(),
            }),
        ];
        for err in errors {
            let msg = format!("{err}");
            assert!(
                msg.starts_with("TS_ERR_"),
                "Error missing TS_ERR_ prefix: {msg}"
            );
        }
    }

    #[test]
    fn retry_classification() {
        assert!(
            TurnstileError::LedgerExecutionFailure {
                cause: "MoveAbort".into()
            }
            .is_retryable()
        );
        assert!(!TurnstileError::EmptyBatch.is_retryable());
        assert!(
            !TurnstileError::SettlementMismatch {
                coin_type: "c".into(),
                credits: 1,
                debits: 0,
                fee: 0
            }
            .is_retryable()
        );
    }

    #[test]
    fn transition_error_names_transition_and_asset() {
        let err = TransitionError::new(
            Transition::CheckIn,
            Some(&ObjectId::new("0xticket")),
            TurnstileError::AlreadyCheckedIn(ObjectId::new("0xticket")),
        );
        let msg = format!("{err}");
        assert!(msg.starts_with("checkIn on 0xticket"), "Got: {msg}");
        assert!(msg.contains("TS_ERR_202"));
        assert!(std::error::Error::source(&err).is_some());

        let err = TransitionError::new(Transition::Mint, None, TurnstileError::EmptyBatch);
        assert!(format!("{err}").contains("<new asset>"));
    }
}
