//! # turnstile-compose
//!
//! **Transaction Composer**: turns typed operation descriptors into one
//! atomic, validated [`Batch`], and sequences escrow purchases so that the
//! transfer policy is always confirmed before the asset moves.
//!
//! ## Flow
//!
//! ```text
//! Operation descriptors → BatchBuilder.push() (reference resolution)
//!     → BatchBuilder.finish() → Batch { operations, gas_budget, digest }
//!
//! PurchaseRequest → PurchaseBatchBuilder: withdraw → confirm → transfer → finish
//! ```
//!
//! Composition is pure data assembly: nothing here talks to a ledger.

pub mod batch;
pub mod purchase;

pub use batch::{Argument, Batch, BatchBuilder, OpHandle, Operation, PureValue, Target, ValueRef, compose};
pub use purchase::{
    PurchaseBatchBuilder, PurchaseRequest, build_purchase_batch, verify_purchase_shape,
};
