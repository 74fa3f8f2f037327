//! # turnstile-types
//!
//! Shared types, errors, and configuration for the **Turnstile** ticket
//! lifecycle engine.
//!
//! This crate is the leaf dependency of the workspace; every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`ObjectId`], [`Address`], [`BatchDigest`]
//! - **Ticket model**: [`Event`], [`TicketClass`], [`Ticket`], [`TicketState`], [`Transition`]
//! - **Raw report model**: [`ExecutionReport`], [`ExecutionStatus`], [`ObjectChange`], [`BalanceChange`], [`Owner`]
//! - **Configuration**: [`ProtocolConfig`], [`RoyaltyConfig`], [`RetryPolicy`], [`LoggingConfig`]
//! - **Errors**: [`TurnstileError`] with `TS_ERR_` prefix codes, [`TransitionError`]
//! - **Constants**: package function names and defaults

pub mod config;
pub mod constants;
pub mod error;
pub mod ids;
pub mod report;
pub mod ticket;

pub use config::*;
pub use error::*;
pub use ids::*;
pub use report::*;
pub use ticket::*;

// Constants are accessed via `turnstile_types::constants::FOO`
// (not re-exported to avoid name collisions).
