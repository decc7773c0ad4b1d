use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use signet_auth::crypto::encode_hex;

use super::contacts::session_record;
use super::guard::parse_json;
use super::{ApiError, AppState, SessionUser, SignedWrite};
use crate::messages::{MessageRecord, NewMessage};

/// Fields a send request carries besides the envelope.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendFields {
    receiver_username: String,
}

#[derive(Serialize)]
pub struct SendResponse {
    status: &'static str,
    id: i64,
    timestamp: String,
}

#[derive(Deserialize)]
pub struct HistoryParams {
    contact: Option<String>,
}

pub async fn send(
    State(state): State<Arc<AppState>>,
    write: SignedWrite,
) -> Result<Json<SendResponse>, ApiError> {
    let fields: SendFields = parse_json(&write.body)?;
    let receiver = state.directory.require(&fields.receiver_username).await?;
    session_record(&state, &write.username).await?;

    let envelope = &write.envelope;
    let stored = state
        .messages
        .append(&NewMessage {
            sender_username: write.username.clone(),
            receiver_username: receiver.username,
            encrypted_message: envelope.payload().to_owned(),
            message_hash: encode_hex(envelope.digest()),
            signature_r: envelope.signature().r_hex(),
            signature_s: envelope.signature().s_hex(),
            sender_public_key: envelope.sender().public_key().to_hex(),
        })
        .await?;
    tracing::info!(
        id = stored.id,
        from = %stored.sender_username,
        to = %stored.receiver_username,
        "Message stored"
    );

    Ok(Json(SendResponse {
        status: "Message sent",
        id: stored.id,
        timestamp: stored.timestamp,
    }))
}

pub async fn history(
    State(state): State<Arc<AppState>>,
    SessionUser(username): SessionUser,
    params: Result<Query<HistoryParams>, QueryRejection>,
) -> Result<Json<Vec<MessageRecord>>, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let contact = params
        .contact
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing contact".into()))?;

    Ok(Json(state.messages.conversation(&username, &contact).await?))
}
