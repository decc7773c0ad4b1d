use serde::{Deserialize, Serialize};

use super::error::CryptoError;
use super::{decode_hex, encode_hex};

const SCALAR_LEN: usize = 32;

/// An ECDSA signature over secp256k1, stored as `R‖S`.
#[derive(Clone, PartialEq, Eq)]
pub struct Signature(k256::ecdsa::Signature);

impl Signature {
    /// Build a signature from big-endian `r` and `s` scalars.
    ///
    /// Scalars shorter than 32 bytes are left-padded with zeros; clients
    /// routinely strip leading zero bytes when printing big integers.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::MalformedInput` if either scalar is empty, longer
    /// than 32 bytes, zero, or not below the group order.
    pub fn from_scalars(r: &[u8], s: &[u8]) -> Result<Self, CryptoError> {
        let mut bytes = [0u8; 2 * SCALAR_LEN];
        left_pad(r, &mut bytes[..SCALAR_LEN])?;
        left_pad(s, &mut bytes[SCALAR_LEN..])?;
        Self::from_bytes(&bytes)
    }

    /// Decode hex `r` and `s` scalars. See [`from_scalars`](Self::from_scalars).
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::MalformedInput` on bad hex or invalid scalars.
    pub fn from_hex(r_hex: &str, s_hex: &str) -> Result<Self, CryptoError> {
        Self::from_scalars(&decode_hex(r_hex)?, &decode_hex(s_hex)?)
    }

    /// Load a signature from 64 raw `R‖S` bytes.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::MalformedInput` if the slice is not 64 bytes or
    /// either half is not a valid non-zero scalar.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != 2 * SCALAR_LEN {
            return Err(CryptoError::MalformedInput("signature must be 64 bytes"));
        }
        k256::ecdsa::Signature::from_slice(bytes)
            .map(Self)
            .map_err(|_| CryptoError::MalformedInput("invalid signature scalar"))
    }

    /// Export the raw `R‖S` bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 64] {
        let mut out = [0u8; 2 * SCALAR_LEN];
        out.copy_from_slice(&self.0.to_bytes());
        out
    }

    /// `r` as 64 lowercase hex characters.
    #[must_use]
    pub fn r_hex(&self) -> String {
        encode_hex(&self.to_bytes()[..SCALAR_LEN])
    }

    /// `s` as 64 lowercase hex characters.
    #[must_use]
    pub fn s_hex(&self) -> String {
        encode_hex(&self.to_bytes()[SCALAR_LEN..])
    }

    /// Wire form for JSON bodies.
    #[must_use]
    pub fn to_wire(&self) -> SignatureHex {
        SignatureHex {
            r: self.r_hex(),
            s: self.s_hex(),
        }
    }

    /// Whether `s <= n/2`.
    #[must_use]
    pub fn is_low_s(&self) -> bool {
        self.0.normalize_s().is_none()
    }

    pub(crate) fn as_inner(&self) -> &k256::ecdsa::Signature {
        &self.0
    }

    #[cfg(any(test, feature = "signer"))]
    pub(crate) fn from_inner(inner: k256::ecdsa::Signature) -> Self {
        Self(inner)
    }

    /// The malleated twin `(r, n - s)`.
    #[cfg(test)]
    pub(crate) fn to_high_s(&self) -> Self {
        let (r, s) = self.0.split_scalars();
        let flipped = k256::ecdsa::Signature::from_scalars(r, -*s)
            .expect("negated non-zero scalar is non-zero");
        Self(flipped)
    }
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bytes = self.to_bytes();
        write!(
            f,
            "Signature({:02x}{:02x}{:02x}{:02x}...)",
            bytes[0], bytes[1], bytes[2], bytes[3]
        )
    }
}

fn left_pad(scalar: &[u8], out: &mut [u8]) -> Result<(), CryptoError> {
    if scalar.is_empty() {
        return Err(CryptoError::MalformedInput("empty signature scalar"));
    }
    if scalar.len() > out.len() {
        return Err(CryptoError::MalformedInput("signature scalar longer than 32 bytes"));
    }
    let offset = out.len() - scalar.len();
    out[offset..].copy_from_slice(scalar);
    Ok(())
}

/// JSON form of a signature: `{"r": hex, "s": hex}`.
///
/// Decoding is deferred to [`Signature::from_hex`] so the caller decides how
/// malformed hex is reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureHex {
    pub r: String,
    pub s: String,
}
