use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::CredentialError;

/// Shortest accepted HMAC secret, in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// The process-wide HMAC key for session credentials.
///
/// Zeroized on drop. `Debug` never prints the bytes.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct TokenSecret(Vec<u8>);

impl TokenSecret {
    /// Wrap existing key material.
    ///
    /// # Errors
    ///
    /// Returns `CredentialError::WeakSecret` if shorter than
    /// [`MIN_SECRET_LEN`] bytes.
    pub fn new(bytes: Vec<u8>) -> Result<Self, CredentialError> {
        if bytes.len() < MIN_SECRET_LEN {
            let actual = bytes.len();
            let mut bytes = bytes;
            bytes.zeroize();
            return Err(CredentialError::WeakSecret {
                min: MIN_SECRET_LEN,
                actual,
            });
        }
        Ok(Self(bytes))
    }

    /// Fresh random secret. Credentials minted with it die with the process.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = vec![0u8; MIN_SECRET_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for TokenSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TokenSecret([redacted])")
    }
}
