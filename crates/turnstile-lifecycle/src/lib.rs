//! # turnstile-lifecycle
//!
//! **Ticket lifecycle**: the state machine, the interfaces to the ledger and
//! key custody, and the orchestrator that runs one transition at a time.
//!
//! ## Architecture
//!
//! ```text
//! caller ─▶ Orchestrator
//!             ├─ planner        precondition check, batch composition
//!             ├─ LedgerClient   submit(batch, signer) → ExecutionReport
//!             ├─ extract        report → TypedEffects
//!             └─ Reconciler     settlement checks (purchases)
//! ```
//!
//! Concurrency is the caller's business: independent submissions may run in
//! parallel, and racing transitions on one asset are serialised by the ledger.

pub mod funding;
pub mod ledger;
pub mod logging;
pub mod orchestrator;
pub mod planner;
pub mod signer;

pub use funding::wait_for_balance;
pub use ledger::{LedgerClient, ReportOptions, Signature, Signer};
pub use logging::init_tracing;
pub use orchestrator::{
    Orchestrator, PurchaseOrder, PurchaseReceipt, TransitionReceipt, TransitionResult,
};
pub use planner::{
    EscrowHandle, NewEvent, TransitionPlan, plan_buy_and_approve, plan_check_in,
    plan_create_class, plan_create_escrow, plan_create_event, plan_list, plan_mint,
};
pub use signer::Ed25519Signer;
