//! Challenge-response login.
//!
//! 1. The client asks for a challenge for a username ([`Authenticator::begin_login`]).
//! 2. It signs `SHA3-256(nonce_hex)` with the private key matching the
//!    registered public key.
//! 3. It submits `(r, s)` ([`Authenticator::complete_login`]) and receives a
//!    session credential.
//!
//! A challenge is consumed by the first completion attempt, successful or
//! not, so a captured answer can never be replayed.

mod authenticator;

pub use authenticator::{Authenticator, LoginGrant};

use std::sync::Arc;

use crate::credential::CredentialError;
use crate::crypto::PublicKey;

/// Errors from the login handshake.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum LoginError {
    /// No public key is registered for the username.
    #[error("unknown identity")]
    UnknownIdentity,

    /// There is no outstanding challenge (never issued, already used, or
    /// expired).
    #[error("no pending challenge")]
    NoPendingChallenge,

    /// The signature does not verify, or its scalars were malformed.
    #[error("invalid signature")]
    InvalidSignature,

    /// Minting the session credential failed.
    #[error(transparent)]
    Credential(#[from] CredentialError),
}

/// Read access to registered public keys.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; lookups happen on every login.
pub trait Directory: Send + Sync {
    /// The public key registered for `username`, if any.
    fn lookup_public_key(&self, username: &str) -> Option<PublicKey>;
}

impl<T: Directory + ?Sized> Directory for Arc<T> {
    fn lookup_public_key(&self, username: &str) -> Option<PublicKey> {
        (**self).lookup_public_key(username)
    }
}
