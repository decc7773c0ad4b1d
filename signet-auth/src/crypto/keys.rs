//! secp256k1 key types.
//!
//! - Public keys keep the exact SEC1 bytes they were parsed from, so a key
//!   registered uncompressed is echoed back uncompressed
//! - Equality is point equality: compressed and uncompressed encodings of the
//!   same point compare equal
//! - Fingerprints are `SHA256:{url_safe_base64_no_padding}` over the
//!   compressed encoding and compare in constant time
//! - Private keys (signer feature only) are zeroized on drop and have no Debug

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::ecdsa::VerifyingKey;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use super::error::CryptoError;
use super::signature::Signature;
use super::{decode_hex, encode_hex, DIGEST_LEN};

/// A secp256k1 public key.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PublicKey {
    key: VerifyingKey,
    encoded: Vec<u8>,
}

impl PublicKey {
    /// Parse a SEC1-encoded point (33-byte compressed or 65-byte uncompressed).
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::MalformedInput` if the bytes are not a valid point
    /// on the curve. The point at infinity is rejected.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let key = VerifyingKey::from_sec1_bytes(bytes)
            .map_err(|_| CryptoError::MalformedInput("not a secp256k1 public key"))?;
        Ok(Self {
            key,
            encoded: bytes.to_vec(),
        })
    }

    /// Parse a hex-encoded SEC1 point.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::MalformedInput` on bad hex or an invalid point.
    pub fn from_hex(text: &str) -> Result<Self, CryptoError> {
        Self::from_bytes(&decode_hex(text)?)
    }

    /// The SEC1 bytes this key was parsed from.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.encoded
    }

    /// Lowercase hex of [`as_bytes`](Self::as_bytes).
    #[must_use]
    pub fn to_hex(&self) -> String {
        encode_hex(&self.encoded)
    }

    /// 33-byte compressed SEC1 encoding.
    #[must_use]
    pub fn to_compressed(&self) -> Vec<u8> {
        self.key.to_encoded_point(true).as_bytes().to_vec()
    }

    /// 65-byte uncompressed SEC1 encoding.
    #[must_use]
    pub fn to_uncompressed(&self) -> Vec<u8> {
        self.key.to_encoded_point(false).as_bytes().to_vec()
    }

    /// Short, log-safe identifier for this key.
    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::from_public_key(self)
    }

    /// Verify a signature over a precomputed digest.
    ///
    /// High-S signatures are rejected even when mathematically valid, so each
    /// (message, key) pair has exactly one acceptable encoding.
    #[must_use]
    pub fn verify_digest(&self, digest: &[u8; DIGEST_LEN], signature: &Signature) -> bool {
        if !signature.is_low_s() {
            return false;
        }
        self.key
            .verify_prehash(digest, signature.as_inner())
            .is_ok()
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.to_compressed().ct_eq(&other.to_compressed()).into()
    }
}

impl Eq for PublicKey {}

impl TryFrom<String> for PublicKey {
    type Error = CryptoError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<PublicKey> for String {
    fn from(value: PublicKey) -> Self {
        value.to_hex()
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicKey({})", self.fingerprint())
    }
}

/// A SHA-256 fingerprint of a public key.
///
/// Format: `SHA256:{url_safe_base64_no_padding}`
///
/// # Security
///
/// Equality is constant time. `Hash` stays derived: the fingerprint is public,
/// only the comparison needs timing protection.
#[derive(Clone, Eq, Hash, Serialize, Deserialize)]
#[allow(clippy::derived_hash_with_manual_eq)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// The prefix used for fingerprint strings.
    pub const PREFIX: &'static str = "SHA256:";

    /// Fingerprint the compressed encoding of `public_key`.
    #[must_use]
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        let hash = Sha256::digest(public_key.to_compressed());
        Self(format!("{}{}", Self::PREFIX, URL_SAFE_NO_PAD.encode(hash)))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for Fingerprint {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_bytes().ct_eq(other.0.as_bytes()).into()
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Fingerprint({})", self.0)
    }
}

/// A secp256k1 signing key, for clients and tests.
///
/// The server never holds one. Signatures are always low-S.
#[cfg(any(test, feature = "signer"))]
pub struct PrivateKey(k256::ecdsa::SigningKey);

// Explicitly NO Debug implementation for PrivateKey. SigningKey zeroizes
// itself on drop.

#[cfg(any(test, feature = "signer"))]
impl PrivateKey {
    /// Generate a new random private key.
    #[must_use]
    pub fn generate() -> Self {
        Self(k256::ecdsa::SigningKey::random(&mut rand::rngs::OsRng))
    }

    /// Load a private key from its 32-byte scalar.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::MalformedInput` if the slice is not 32 bytes or
    /// the scalar is zero or not below the group order.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != 32 {
            return Err(CryptoError::MalformedInput("private key must be 32 bytes"));
        }
        k256::ecdsa::SigningKey::from_slice(bytes)
            .map(Self)
            .map_err(|_| CryptoError::MalformedInput("invalid private scalar"))
    }

    /// Export the raw scalar.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out.copy_from_slice(&self.0.to_bytes());
        out
    }

    /// The matching public key, compressed.
    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        let key = *self.0.verifying_key();
        PublicKey {
            encoded: key.to_encoded_point(true).as_bytes().to_vec(),
            key,
        }
    }

    /// Sign a precomputed 32-byte digest (RFC 6979 nonce, low-S).
    #[must_use]
    pub fn sign_digest(&self, digest: &[u8; DIGEST_LEN]) -> Signature {
        use k256::ecdsa::signature::hazmat::PrehashSigner;
        let sig: k256::ecdsa::Signature = self
            .0
            .sign_prehash(digest)
            .expect("signing a 32-byte prehash cannot fail");
        Signature::from_inner(sig.normalize_s().unwrap_or(sig))
    }

    /// Hash `message` with SHA3-256 and sign the digest.
    #[must_use]
    pub fn sign_message(&self, message: &[u8]) -> Signature {
        self.sign_digest(&super::digest(message))
    }
}
