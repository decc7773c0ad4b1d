use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::{CredentialError, TokenSecret};

/// Default lifetime of a session credential (72 hours).
pub const DEFAULT_TOKEN_TTL_SECONDS: i64 = 72 * 60 * 60;
/// Shortest configurable lifetime (1 hour).
pub const MIN_TOKEN_TTL_SECONDS: i64 = 60 * 60;
/// Longest configurable lifetime (7 days).
pub const MAX_TOKEN_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Value of the `iss` claim. Tokens from other issuers sharing the secret
/// are rejected.
pub const TOKEN_ISSUER: &str = "signet";

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iss: String,
    iat: i64,
    exp: i64,
}

/// A freshly minted session credential.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCredential {
    pub token: String,
    pub subject: String,
    pub issued_at: i64,
    pub expires_at: i64,
}

impl std::fmt::Debug for SessionCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCredential")
            .field("subject", &self.subject)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Mints and validates HS256 session credentials.
///
/// Validation checks the MAC before the expiry, so an expired token is only
/// ever reported as `Expired` if it was genuinely issued here.
pub struct CredentialIssuer {
    secret: TokenSecret,
    ttl_seconds: i64,
    validation: Validation,
}

impl CredentialIssuer {
    /// Create an issuer. `ttl_seconds` is clamped to 1 hour..=7 days.
    #[must_use]
    pub fn new(secret: TokenSecret, ttl_seconds: i64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked by hand below with a strict `now < exp`.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);
        validation.set_issuer(&[TOKEN_ISSUER]);

        Self {
            secret,
            ttl_seconds: ttl_seconds.clamp(MIN_TOKEN_TTL_SECONDS, MAX_TOKEN_TTL_SECONDS),
            validation,
        }
    }

    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    /// Mint a credential for `subject`, valid from `now` for the TTL.
    ///
    /// # Errors
    ///
    /// Returns `CredentialError::Encoding` if serialization fails or `now`
    /// is so large that the expiry overflows.
    pub fn mint(&self, subject: &str, now: i64) -> Result<SessionCredential, CredentialError> {
        let exp = now
            .checked_add(self.ttl_seconds)
            .ok_or_else(|| CredentialError::Encoding("expiry out of range".into()))?;
        let claims = Claims {
            sub: subject.to_owned(),
            iss: TOKEN_ISSUER.to_owned(),
            iat: now,
            exp,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| CredentialError::Encoding(e.to_string()))?;

        Ok(SessionCredential {
            token,
            subject: claims.sub,
            issued_at: claims.iat,
            expires_at: claims.exp,
        })
    }

    /// Validate a presented token and return its subject.
    ///
    /// # Errors
    ///
    /// `Invalid` for any MAC, algorithm, issuer or format problem; `Expired`
    /// when the MAC is good but `now >= exp`.
    pub fn validate(&self, token: &str, now: i64) -> Result<String, CredentialError> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &self.validation,
        )
        .map_err(|_| CredentialError::Invalid)?;

        if now >= data.claims.exp {
            return Err(CredentialError::Expired);
        }
        if data.claims.sub.is_empty() {
            return Err(CredentialError::Invalid);
        }

        Ok(data.claims.sub)
    }
}
