//! API error taxonomy.
//!
//! Every failure path in the service funnels into [`ApiError`], which maps
//! onto exactly one HTTP response and one log record:
//!
//! - `Validation` → 422 with per-field detail
//! - `Authentication` → 401 with a fixed generic message (never reveals
//!   whether the username or the password was wrong)
//! - `Conflict` → 409 naming the conflicting field
//! - `NotFound` → 404
//! - `Dependency` → 500; the cause is logged, the caller sees a generic body

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use thiserror::Error;

/// One validation failure, tied to the request field that caused it.
#[derive(Debug, Clone, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("validation failed")]
    Validation(Vec<FieldError>),

    /// Bad credentials or a missing/malformed/expired/forged token. One
    /// variant on purpose: all authentication failures must be
    /// indistinguishable to the caller.
    #[error("authentication failed")]
    Authentication,

    #[error("{field} already exists")]
    Conflict { field: &'static str, value: String },

    #[error("{0} not found")]
    NotFound(String),

    /// The store (or another collaborator) failed. Never retried here;
    /// surfaced as a generic server fault.
    #[error("internal error")]
    Dependency(anyhow::Error),
}

impl ApiError {
    /// Shorthand for a single-field validation error.
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        ApiError::Validation(vec![FieldError {
            field,
            message: message.into(),
        }])
    }
}

impl From<rusqlite::Error> for ApiError {
    fn from(err: rusqlite::Error) -> Self {
        ApiError::Dependency(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::Validation(details) => {
                tracing::debug!(?details, "request failed validation");
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    serde_json::json!({"error": "validation failed", "details": details}),
                )
            }
            ApiError::Authentication => {
                tracing::debug!("authentication failed");
                (
                    StatusCode::UNAUTHORIZED,
                    serde_json::json!({"error": "authentication failed"}),
                )
            }
            ApiError::Conflict { field, value } => {
                tracing::debug!(field, value, "conflict");
                (
                    StatusCode::CONFLICT,
                    serde_json::json!({"error": format!("{field} already exists"), "field": field}),
                )
            }
            ApiError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                serde_json::json!({"error": format!("{what} not found")}),
            ),
            ApiError::Dependency(cause) => {
                tracing::error!(?cause, "dependency failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    serde_json::json!({"error": "internal error"}),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}
