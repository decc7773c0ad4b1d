//! Single-use login challenges.
//!
//! At most one challenge is outstanding per identity. Issuing a new one
//! replaces the old one, and consuming a challenge removes it whether or not
//! the caller goes on to accept the login.

mod memory;

pub use memory::{MemoryNonceStore, DEFAULT_CHALLENGE_TTL};

use std::sync::Arc;

use rand::RngCore;
use subtle::ConstantTimeEq;

use crate::crypto::{self, CryptoError, DIGEST_LEN};

/// Size of a challenge nonce in bytes.
pub const NONCE_LEN: usize = 32;

/// Errors from [`NonceStore::consume`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum NonceError {
    /// No challenge is outstanding for this identity.
    #[error("no pending challenge")]
    NotFound,

    /// A challenge existed but outlived its TTL. It has been removed.
    #[error("challenge expired")]
    Expired,
}

/// A fresh random challenge.
#[derive(Clone)]
pub struct ChallengeNonce([u8; NONCE_LEN]);

impl ChallengeNonce {
    /// Draw 32 bytes from the OS CSPRNG.
    ///
    /// # Panics
    ///
    /// Panics if the OS random source is unavailable. There is no safe
    /// fallback.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; NONCE_LEN];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    #[must_use]
    pub fn from_bytes(bytes: [u8; NONCE_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse the wire form.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::MalformedInput` unless `text` is 64 hex chars.
    pub fn from_hex(text: &str) -> Result<Self, CryptoError> {
        let bytes: [u8; NONCE_LEN] = crypto::decode_hex(text)?
            .try_into()
            .map_err(|_| CryptoError::MalformedInput("nonce must be 32 bytes"))?;
        Ok(Self(bytes))
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; NONCE_LEN] {
        &self.0
    }

    /// Wire form: 64 lowercase hex characters.
    #[must_use]
    pub fn to_hex(&self) -> String {
        crypto::encode_hex(&self.0)
    }

    /// The digest a client signs to answer this challenge.
    ///
    /// Clients hash the hex text they received, not the raw bytes.
    #[must_use]
    pub fn signing_digest(&self) -> [u8; DIGEST_LEN] {
        crypto::digest(self.to_hex().as_bytes())
    }
}

impl PartialEq for ChallengeNonce {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for ChallengeNonce {}

impl std::fmt::Debug for ChallengeNonce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ChallengeNonce({:02x}{:02x}...)", self.0[0], self.0[1])
    }
}

/// Storage for outstanding challenges, keyed by identity.
///
/// # Atomicity
///
/// `consume` must be an atomic read-and-delete. Of any number of concurrent
/// `consume` calls for one identity, at most one may return the nonce.
/// `issue` and `consume` for the same identity must be linearizable: a
/// `consume` observes either the state before an `issue` or after it.
///
/// # Thread Safety
///
/// Implementations must be safe to share across threads (`Send + Sync`).
pub trait NonceStore: Send + Sync {
    /// Generate a fresh nonce for `identity`, replacing any outstanding one.
    fn issue(&self, identity: &str) -> ChallengeNonce;

    /// Remove and return the outstanding nonce for `identity`.
    ///
    /// # Errors
    ///
    /// `NotFound` if nothing is outstanding, `Expired` if the nonce outlived
    /// its TTL. In both cases nothing remains stored afterwards.
    fn consume(&self, identity: &str) -> Result<ChallengeNonce, NonceError>;
}

impl<T: NonceStore + ?Sized> NonceStore for Arc<T> {
    fn issue(&self, identity: &str) -> ChallengeNonce {
        (**self).issue(identity)
    }

    fn consume(&self, identity: &str) -> Result<ChallengeNonce, NonceError> {
        (**self).consume(identity)
    }
}
