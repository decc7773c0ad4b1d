//! Session credentials.
//!
//! A successful login yields an HS256 JSON Web Token naming the user. Every
//! later request presents it; [`CredentialIssuer::validate`] checks the MAC
//! and then the expiry.

mod issuer;
mod secret;

pub use issuer::{
    CredentialIssuer, SessionCredential, DEFAULT_TOKEN_TTL_SECONDS, MAX_TOKEN_TTL_SECONDS,
    MIN_TOKEN_TTL_SECONDS, TOKEN_ISSUER,
};
pub use secret::{TokenSecret, MIN_SECRET_LEN};

/// Errors from minting or validating session credentials.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum CredentialError {
    /// Bad MAC, wrong algorithm, wrong issuer, missing claims or garbage.
    #[error("invalid credential")]
    Invalid,

    /// The MAC checks out but the credential is past its expiry.
    #[error("credential expired")]
    Expired,

    /// The signing secret is too short to be trusted.
    #[error("token secret must be at least {min} bytes, got {actual}")]
    WeakSecret { min: usize, actual: usize },

    /// The token could not be serialized.
    #[error("failed to encode credential: {0}")]
    Encoding(String),
}
