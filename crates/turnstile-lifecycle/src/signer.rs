//! Ed25519 key custody adapter.
//!
//! The address of a key is `0x` followed by the hex SHA-256 of its public
//! key bytes.

use std::fmt;

use ed25519_dalek::{Signer as _, SigningKey, Verifier as _, VerifyingKey};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use turnstile_types::{Address, Result};

use crate::ledger::{Signature, Signer};

/// In-process signer around an `ed25519-dalek` key.
pub struct Ed25519Signer {
    key: SigningKey,
    address: Address,
}

impl Ed25519Signer {
    /// Generate a fresh key from the OS random source.
    #[must_use]
    pub fn generate() -> Self {
        Self::from_key(SigningKey::generate(&mut OsRng))
    }

    /// Deterministic key from a 32-byte seed.
    #[must_use]
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self::from_key(SigningKey::from_bytes(seed))
    }

    fn from_key(key: SigningKey) -> Self {
        let address = address_of(&key.verifying_key());
        Self { key, address }
    }

    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }
}

impl fmt::Debug for Ed25519Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ed25519Signer")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl Signer for Ed25519Signer {
    fn address(&self) -> &Address {
        &self.address
    }

    fn sign(&self, message: &[u8]) -> Result<Signature> {
        Ok(Signature(self.key.sign(message).to_bytes()))
    }
}

/// Ledger address of a public key.
#[must_use]
pub fn address_of(key: &VerifyingKey) -> Address {
    let digest = Sha256::digest(key.as_bytes());
    Address::new(format!("0x{}", hex::encode(digest)))
}

/// Check `signature` over `message` against `key`.
#[must_use]
pub fn verify(key: &VerifyingKey, message: &[u8], signature: &Signature) -> bool {
    let sig = ed25519_dalek::Signature::from_bytes(&signature.0);
    key.verify(message, &sig).is_ok()
}
