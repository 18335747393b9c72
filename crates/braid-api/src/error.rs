use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Command failure taxonomy. Every variant is terminal for the request —
/// nothing in the core retries.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Missing, invalid, expired, or revoked session.
    #[error("unauthorized")]
    Unauthorized,

    /// Login credential mismatch. Deliberately uniform: the same error for
    /// an unknown email and a wrong password, so accounts can't be
    /// enumerated.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Malformed or missing fields, empty-after-trim content, bad enum values.
    #[error("{0}")]
    Validation(String),

    /// Duplicate channel name or email.
    #[error("{0}")]
    Conflict(String),

    /// Editing or deleting another user's content.
    #[error("forbidden")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    /// Post-write re-fetch returned nothing, or the store itself failed —
    /// a data-integrity bug, not a user error.
    #[error("internal server error")]
    Internal,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized | ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.to_string() }));
        (self.status(), body).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        error!("Store error: {:#}", e);
        ApiError::Internal
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
