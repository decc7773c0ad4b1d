//! HTTP error mapping.
//!
//! Responses carry a short fixed message per status. Whatever detail the
//! variant holds goes to the log only.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use signet_auth::{CredentialError, IntegrityError, LoginError};

use crate::directory::DirectoryError;

/// Errors returned by HTTP handlers and guards.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("no pending login request")]
    NoPendingChallenge,

    #[error("unauthorized: {0}")]
    Unauthorized(&'static str),

    #[error("not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(&'static str),

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
}

impl ApiError {
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::NoPendingChallenge => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    const fn public_message(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad request",
            Self::NoPendingChallenge => "no pending login request",
            Self::Unauthorized(_) => "unauthorized",
            Self::NotFound => "not found",
            Self::Conflict(_) => "conflict",
            Self::RateLimited => "too many requests",
            Self::Internal(_) => "internal error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            Self::Internal(detail) => tracing::error!(error = %detail, "Request failed"),
            Self::Unauthorized(reason) => tracing::debug!(reason, "Request rejected"),
            other => tracing::debug!(error = %other, "Request rejected"),
        }

        let body = Json(ErrorBody {
            error: self.public_message(),
        });
        (self.status_code(), body).into_response()
    }
}

impl From<LoginError> for ApiError {
    fn from(err: LoginError) -> Self {
        match err {
            LoginError::UnknownIdentity => Self::NotFound,
            LoginError::NoPendingChallenge => Self::NoPendingChallenge,
            LoginError::InvalidSignature => Self::Unauthorized("invalid signature"),
            LoginError::Credential(e) => Self::Internal(e.to_string()),
            _ => Self::Internal(err.to_string()),
        }
    }
}

impl From<CredentialError> for ApiError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::Invalid => Self::Unauthorized("invalid token"),
            CredentialError::Expired => Self::Unauthorized("expired token"),
            _ => Self::Internal(err.to_string()),
        }
    }
}

impl From<IntegrityError> for ApiError {
    fn from(err: IntegrityError) -> Self {
        match err {
            IntegrityError::MalformedRequest => Self::BadRequest("malformed envelope".into()),
            _ => Self::Unauthorized("integrity check failed"),
        }
    }
}

impl From<DirectoryError> for ApiError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::InvalidUsername => Self::BadRequest("invalid username".into()),
            DirectoryError::UsernameTaken => Self::Conflict("username taken"),
            DirectoryError::KeyTaken => Self::Conflict("public key taken"),
            DirectoryError::NotFound => Self::NotFound,
            DirectoryError::CorruptKey { .. } | DirectoryError::Database(_) => {
                Self::Internal(err.to_string())
            }
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        Self::Internal(err.to_string())
    }
}
