//! Request guards.
//!
//! [`SessionUser`] requires a valid bearer token. [`SignedWrite`] requires a
//! valid bearer token and a body that passes the integrity gate, signed by the
//! key registered to the token's subject.

use std::sync::Arc;

use axum::async_trait;
use axum::body::Bytes;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use serde::de::DeserializeOwned;
use signet_auth::{Directory, VerifiedEnvelope};

use super::{ApiError, AppState};
use crate::unix_now;

/// The subject of a valid session token.
#[derive(Debug, Clone)]
pub struct SessionUser(pub String);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for SessionUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token =
            bearer_token(&parts.headers).ok_or(ApiError::Unauthorized("missing bearer token"))?;
        let username = state.authenticator.issuer().validate(token, unix_now())?;
        Ok(Self(username))
    }
}

/// A write request that passed both guards.
///
/// `body` is the raw request body, read once. The gate has already checked
/// it; handlers parse their own extra fields from the same bytes.
pub struct SignedWrite {
    pub username: String,
    pub envelope: VerifiedEnvelope,
    pub body: Bytes,
}

#[async_trait]
impl FromRequest<Arc<AppState>> for SignedWrite {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let (mut parts, body) = req.into_parts();
        let SessionUser(username) = SessionUser::from_request_parts(&mut parts, state).await?;

        let body = Bytes::from_request(Request::from_parts(parts, body), state)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        let envelope = state.gate.check(&body)?;

        let registered = state
            .directory
            .lookup_public_key(&username)
            .ok_or(ApiError::Unauthorized("session user has no key"))?;
        if registered != *envelope.sender().public_key() {
            tracing::warn!(
                username = %username,
                sender = %envelope.sender().public_key().fingerprint(),
                "Signed body does not belong to session user"
            );
            return Err(ApiError::Unauthorized("sender key does not match session"));
        }

        Ok(Self {
            username,
            envelope,
            body,
        })
    }
}

/// Parse a JSON body, mapping any failure to 400.
pub fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(e.to_string()))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
