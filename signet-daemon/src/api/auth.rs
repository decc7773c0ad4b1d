use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use signet_auth::{PublicKey, SignatureHex};

use super::guard::parse_json;
use super::{ApiError, AppState};
use crate::unix_now;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    username: String,
    public_key: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    message: &'static str,
    user_id: i64,
    username: String,
}

#[derive(Deserialize)]
pub struct ChallengeRequest {
    username: String,
}

#[derive(Serialize)]
pub struct ChallengeResponse {
    nonce: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    username: String,
    signature: SignatureHex,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    token: String,
    username: String,
    public_key: String,
    expires_at: i64,
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let req: RegisterRequest = parse_json(&body)?;
    let public_key = PublicKey::from_hex(&req.public_key)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let user = state.directory.register(&req.username, &public_key).await?;
    tracing::info!(
        username = %user.username,
        key = %public_key.fingerprint(),
        "User registered"
    );

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User registered successfully",
            user_id: user.id,
            username: user.username,
        }),
    ))
}

pub async fn challenge(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<ChallengeResponse>, ApiError> {
    let req: ChallengeRequest = parse_json(&body)?;
    let nonce = state.authenticator.begin_login(&req.username)?;
    tracing::info!(username = %req.username, "Challenge issued");

    Ok(Json(ChallengeResponse {
        nonce: nonce.to_hex(),
    }))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<LoginResponse>, ApiError> {
    let req: LoginRequest = parse_json(&body)?;

    let grant = state
        .authenticator
        .complete_login(&req.username, &req.signature.r, &req.signature.s, unix_now())
        .map_err(|e| {
            tracing::warn!(username = %req.username, error = %e, "Login failed");
            ApiError::from(e)
        })?;
    tracing::info!(
        username = %grant.username(),
        key = %grant.public_key().fingerprint(),
        "Login succeeded"
    );

    Ok(Json(LoginResponse {
        token: grant.token().to_owned(),
        username: grant.username().to_owned(),
        public_key: grant.public_key().to_hex(),
        expires_at: grant.expires_at(),
    }))
}
