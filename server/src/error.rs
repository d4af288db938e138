//! Server error type. Each variant is tagged with the taxonomy row it
//! belongs to (spec §7) and maps to the documented HTTP status and
//! `{"detail": ...}` body shape via `IntoResponse` — the Design Note's
//! "explicit result variants" made concrete.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    /// configuration-fatal
    #[error("configuration error: {0}")]
    Config(String),

    /// authorization: missing/invalid bearer credential
    #[error("unauthorized")]
    Unauthorized,

    /// authorization: device mismatch
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// validation-input: malformed Content-Length
    #[error("bad request: {0}")]
    BadRequest(String),

    /// validation-input: schema validation failure
    #[error("unprocessable: {0}")]
    Unprocessable(String),

    /// validation-input: size/count overflow
    #[error("payload too large: {0}")]
    TooLarge(String),

    /// storage: not found
    #[error("not found: {0}")]
    NotFound(String),

    /// storage / logic-bug: anything else
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Config(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::TooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = match &self {
            Self::Unauthorized => "Invalid or missing bearer token.".to_string(),
            Self::Config(_) | Self::Internal(_) => {
                tracing::error!(error = %self, "internal error");
                "Internal server error.".to_string()
            }
            other => other.to_string(),
        };
        let body = Json(json!({ "detail": detail }));
        if matches!(self, Self::Unauthorized) {
            (status, [(header::WWW_AUTHENTICATE, "Bearer")], body).into_response()
        } else {
            (status, body).into_response()
        }
    }
}

impl From<sqlx::Error> for ServerError {
    fn from(err: sqlx::Error) -> Self {
        Self::Internal(err.to_string())
    }
}
