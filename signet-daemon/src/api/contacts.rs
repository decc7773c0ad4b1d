use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::{ApiError, AppState, SessionUser, SignedWrite};
use crate::directory::{DirectoryError, UserRecord};

const SEARCH_LIMIT: i64 = 20;

#[derive(Deserialize)]
pub struct SearchParams {
    q: Option<String>,
}

#[derive(Serialize)]
pub struct AddContactResponse {
    status: &'static str,
    contact: UserRecord,
}

/// The session user's own record. A token for a user that no longer exists
/// is treated as unauthorized.
pub(super) async fn session_record(
    state: &AppState,
    username: &str,
) -> Result<UserRecord, ApiError> {
    match state.directory.require(username).await {
        Ok(user) => Ok(user),
        Err(DirectoryError::NotFound) => Err(ApiError::Unauthorized("session user not found")),
        Err(e) => Err(e.into()),
    }
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    SessionUser(username): SessionUser,
) -> Result<Json<Vec<UserRecord>>, ApiError> {
    let owner = session_record(&state, &username).await?;
    Ok(Json(state.contacts.list(&owner).await?))
}

/// Add a contact. The signed payload is the contact's username.
pub async fn add(
    State(state): State<Arc<AppState>>,
    write: SignedWrite,
) -> Result<Json<AddContactResponse>, ApiError> {
    let contact_name = write.envelope.payload();
    if contact_name == write.username {
        return Err(ApiError::BadRequest("cannot add yourself".into()));
    }

    let owner = session_record(&state, &write.username).await?;
    let contact = state.directory.require(contact_name).await?;
    let added = state.contacts.add(&owner, &contact).await?;
    tracing::info!(username = %owner.username, contact = %contact.username, added, "Contact add");

    Ok(Json(AddContactResponse {
        status: if added {
            "Contact added successfully"
        } else {
            "Contact already added"
        },
        contact,
    }))
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    SessionUser(username): SessionUser,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<Vec<UserRecord>>, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let query = params.q.unwrap_or_default();
    let users = state
        .directory
        .search(query.trim(), &username, SEARCH_LIMIT)
        .await?;
    Ok(Json(users))
}
