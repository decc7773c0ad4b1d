//! Hash and signature primitive.
//!
//! Everything that touches secp256k1 or SHA3 lives here. The rest of the
//! crate works with [`PublicKey`], [`Signature`] and 32-byte digests and
//! never sees the curve library directly.
//!
//! The cross-system contract with clients:
//!
//! - digests are SHA3-256 over the exact bytes being authenticated,
//! - signatures are ECDSA over secp256k1, transmitted as two hex scalars
//!   `r` and `s` (each at most 32 bytes, left-padded when shorter),
//! - only low-S signatures are accepted,
//! - public keys are SEC1 points, compressed or uncompressed, in hex.

mod error;
mod keys;
mod signature;

pub use error::CryptoError;
#[cfg(any(test, feature = "signer"))]
pub use keys::PrivateKey;
pub use keys::{Fingerprint, PublicKey};
pub use signature::{Signature, SignatureHex};

use sha3::{Digest, Sha3_256};

/// Length of every digest produced by [`digest`].
pub const DIGEST_LEN: usize = 32;

/// Hash arbitrary bytes with SHA3-256.
#[must_use]
pub fn digest(bytes: &[u8]) -> [u8; DIGEST_LEN] {
    Sha3_256::digest(bytes).into()
}

/// Decode hex text into bytes.
///
/// Upper and lower case are both accepted. A `0x` prefix is not.
///
/// # Errors
///
/// Returns `CryptoError::MalformedInput` on odd length or any non-hex
/// character.
pub fn decode_hex(text: &str) -> Result<Vec<u8>, CryptoError> {
    hex::decode(text).map_err(|err| match err {
        hex::FromHexError::OddLength => CryptoError::MalformedInput("odd-length hex"),
        _ => CryptoError::MalformedInput("invalid hex character"),
    })
}

/// Encode bytes as lowercase hex.
#[must_use]
pub fn encode_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Check an ECDSA signature `(r, s)` over `hash` against a SEC1 public key.
///
/// Malformed key bytes, malformed scalars, high-S signatures and signatures
/// that simply do not match all return `false`. This function never panics.
#[must_use]
pub fn verify(hash: &[u8; DIGEST_LEN], r: &[u8], s: &[u8], public_key: &[u8]) -> bool {
    let Ok(key) = PublicKey::from_bytes(public_key) else {
        return false;
    };
    let Ok(signature) = Signature::from_scalars(r, s) else {
        return false;
    };
    key.verify_digest(hash, &signature)
}

/// Hex front end for [`verify`].
///
/// # Errors
///
/// Returns `CryptoError::MalformedInput` when any of the three strings is
/// not valid hex. Once decoded, every other problem yields `Ok(false)`.
pub fn verify_hex(
    hash: &[u8; DIGEST_LEN],
    r_hex: &str,
    s_hex: &str,
    public_key_hex: &str,
) -> Result<bool, CryptoError> {
    let r = decode_hex(r_hex)?;
    let s = decode_hex(s_hex)?;
    let public_key = decode_hex(public_key_hex)?;
    Ok(verify(hash, &r, &s, &public_key))
}
