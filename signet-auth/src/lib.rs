//! Signature-based authentication core for Signet.
//!
//! This crate is intentionally IO-free:
//! - No filesystem operations
//! - No network calls
//! - No database interactions
//! - No logging
//!
//! Dependencies are injected via traits:
//! - [`login::Directory`] - Username to public key lookup
//! - [`nonce::NonceStore`] - Outstanding login challenges
//! - [`integrity::KeyRegistry`] - Public key to owner lookup
//!
//! # Example
//!
//! ```ignore
//! use signet_auth::{Authenticator, CredentialIssuer, MemoryNonceStore, TokenSecret};
//!
//! let auth = Authenticator::new(directory, MemoryNonceStore::default(), issuer);
//!
//! // Server hands out a challenge...
//! let nonce = auth.begin_login("alice")?;
//! // ...the client signs SHA3-256(nonce.to_hex()) and answers.
//! let grant = auth.complete_login("alice", &r_hex, &s_hex, now)?;
//! ```

pub mod credential;
pub mod crypto;
pub mod integrity;
pub mod login;
pub mod nonce;

pub use credential::{CredentialError, CredentialIssuer, SessionCredential, TokenSecret};
#[cfg(any(test, feature = "signer"))]
pub use crypto::PrivateKey;
pub use crypto::{CryptoError, Fingerprint, PublicKey, Signature, SignatureHex};
pub use integrity::{
    IntegrityError, IntegrityGate, KeyRegistry, SenderPolicy, VerifiedEnvelope, VerifiedSender,
};
pub use login::{Authenticator, Directory, LoginError, LoginGrant};
pub use nonce::{ChallengeNonce, MemoryNonceStore, NonceError, NonceStore};
