//! HTTP surface.
//!
//! | Route                      | Guard                 |
//! |----------------------------|-----------------------|
//! | `GET /health`              | none                  |
//! | `POST /auth/*`             | per-peer rate limit   |
//! | `GET /api/contacts`        | session token         |
//! | `GET /api/users/search`    | session token         |
//! | `GET /api/chat/history`    | session token         |
//! | `POST /api/contacts/add`   | token + signed body   |
//! | `POST /api/chat/send`      | token + signed body   |

mod auth;
mod chat;
mod contacts;
mod error;
mod guard;

pub use error::ApiError;
pub use guard::{SessionUser, SignedWrite};

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, DefaultBodyLimit, Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use signet_auth::{Authenticator, CredentialError, IntegrityGate, MemoryNonceStore};

use crate::config::ServerConfig;
use crate::contacts::ContactStore;
use crate::db::Database;
use crate::directory::{DirectoryError, UserDirectory};
use crate::messages::MessageStore;
use crate::rate_limit::AuthRateLimiter;

/// Request bodies above this size are rejected.
pub const MAX_BODY_BYTES: usize = 256 * 1024;

/// Errors while assembling [`AppState`].
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error(transparent)]
    Credential(#[from] CredentialError),
}

/// Everything the handlers share.
pub struct AppState {
    pub authenticator: Authenticator<Arc<UserDirectory>, Arc<MemoryNonceStore>>,
    pub gate: IntegrityGate<Arc<UserDirectory>>,
    pub directory: Arc<UserDirectory>,
    pub nonces: Arc<MemoryNonceStore>,
    pub contacts: ContactStore,
    pub messages: MessageStore,
    pub rate_limiter: AuthRateLimiter,
}

impl AppState {
    pub async fn new(db: &Database, config: &ServerConfig) -> Result<Self, StartupError> {
        let directory = Arc::new(UserDirectory::new(db).await?);
        let nonces = Arc::new(MemoryNonceStore::new(config.challenge_ttl));
        let issuer = config.token_issuer()?;

        tracing::info!(
            users = directory.len(),
            policy = ?config.sender_policy,
            token_ttl_secs = issuer.ttl_seconds(),
            "Application state ready"
        );

        Ok(Self {
            authenticator: Authenticator::new(Arc::clone(&directory), Arc::clone(&nonces), issuer),
            gate: IntegrityGate::new(Arc::clone(&directory), config.sender_policy),
            directory,
            nonces,
            contacts: ContactStore::new(db),
            messages: MessageStore::new(db),
            rate_limiter: AuthRateLimiter::new(config.rate_per_second, config.rate_burst),
        })
    }
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login/challenge", post(auth::challenge))
        .route("/login", post(auth::login))
        .route("/login/verify", post(auth::login))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            rate_limit,
        ));

    let api_routes = Router::new()
        .route("/contacts", get(contacts::list))
        .route("/contacts/add", post(contacts::add))
        .route("/users/search", get(contacts::search))
        .route("/chat/send", post(chat::send))
        .route("/chat/history", get(chat::history));

    Router::new()
        .route("/health", get(health))
        .nest("/auth", auth_routes)
        .nest("/api", api_routes)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

async fn rate_limit(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    state.rate_limiter.check(peer)?;
    Ok(next.run(request).await)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    time: String,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        time: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    })
}
