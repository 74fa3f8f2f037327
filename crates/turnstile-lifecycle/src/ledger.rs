//! Narrow interfaces to the two external collaborators: the ledger client
//! and the key custody provider.
//!
//! Both are black boxes. Implementations may be slow or transiently
//! unavailable; nothing in this crate retries a submission.

use std::fmt;

use serde::{Deserialize, Serialize};
use turnstile_compose::Batch;
use turnstile_types::{Address, ExecutionReport, ObjectId, ObjectSnapshot, Result};

/// A detached 64-byte signature over [`Batch::signing_bytes`].
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(pub [u8; 64]);

impl Signature {
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({}..)", &self.to_hex()[..16])
    }
}

/// Signing capability bound to one address. Never exposes secret material.
pub trait Signer {
    fn address(&self) -> &Address;

    /// # Errors
    /// Returns [`TurnstileError::Signing`](turnstile_types::TurnstileError::Signing)
    /// if the provider refuses or fails to sign.
    fn sign(&self, message: &[u8]) -> Result<Signature>;
}

/// Which optional report sections the node should include.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct ReportOptions {
    pub show_effects: bool,
    pub show_object_changes: bool,
    pub show_balance_changes: bool,
    pub show_events: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            show_effects: true,
            show_object_changes: true,
            show_balance_changes: true,
            show_events: true,
        }
    }
}

/// Submission and read access to the shared ledger.
pub trait LedgerClient {
    /// Submit one signed batch and return the node's raw execution report.
    ///
    /// A batch the ledger executed and rejected is still `Ok`: the failure
    /// lives in the report's status. `Err` means no report was obtained.
    fn submit(
        &self,
        batch: &Batch,
        signer: &dyn Signer,
        options: ReportOptions,
    ) -> Result<ExecutionReport>;

    /// Balance of `address` in minor units. `None` means the native coin.
    fn get_balance(&self, address: &Address, coin_type: Option<&str>) -> Result<u64>;

    fn get_object(&self, id: &ObjectId) -> Result<ObjectSnapshot>;
}
