//! # turnstile-effects
//!
//! Reads ledger execution reports back into typed facts.
//!
//! - [`extract`] turns a raw [`ExecutionReport`](turnstile_types::ExecutionReport)
//!   into [`TypedEffects`], keeping "section omitted" distinct from "section empty".
//! - [`TagMatcher`] classifies created objects by type tag.
//! - [`Reconciler`] verifies value conservation, the payer's spend window,
//!   and royalty payment for sales.

pub mod extractor;
pub mod reconcile;
pub mod tag;

pub use extractor::{ObjectEffect, Section, Settlement, TypedEffects, extract};
pub use reconcile::{
    BalanceSnapshot, Reconciler, Reconciliation, RoyaltyObservation, SettlementWarning,
    SpendExpectation,
};
pub use tag::{TagMatcher, struct_name};
