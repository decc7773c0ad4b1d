//! Per-request integrity checks.
//!
//! A protected request body is a JSON envelope:
//!
//! ```json
//! {
//!   "encryptedData": "<opaque payload string>",
//!   "signature": { "r": "<hex>", "s": "<hex>" },
//!   "senderPublicKey": "<hex SEC1 point>"
//! }
//! ```
//!
//! The signed bytes are the UTF-8 bytes of the decoded `encryptedData`
//! string. Everything else about the JSON text (field order, whitespace,
//! extra fields) is irrelevant to the signature. Extra fields are left for
//! the handler to read from the same body.

mod gate;

pub use gate::{
    IntegrityGate, KeyRegistry, NoRegistry, SenderPolicy, SignedEnvelope, VerifiedEnvelope,
    VerifiedSender,
};

/// Errors from [`IntegrityGate::check`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum IntegrityError {
    /// The body is not a JSON object with the envelope fields.
    #[error("malformed request")]
    MalformedRequest,

    /// The envelope parsed but the signature, key or sender policy rejected it.
    #[error("integrity check failed")]
    IntegrityFailure,
}
