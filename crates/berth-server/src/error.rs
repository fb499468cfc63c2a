//! HTTP error types for the Berth server.
//!
//! Maps domain errors from `berth-core` into HTTP responses. Every error
//! produces a JSON body with a machine-readable `error` field and a
//! human-readable `message`. Internal errors are logged and their message
//! replaced before it reaches the client.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use berth_core::error::{
    AccountError, ConfigError, FieldViolation, HierarchyError, SessionError, StoreError,
};

/// Application-level error returned from HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A field failed validation.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Registration failed one or more rules.
    #[error("registration rejected")]
    InvalidRegistration(Vec<FieldViolation>),

    /// Malformed request outside domain validation.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// No session, or the session is not valid.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Two variables of one resource share a key.
    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    /// Stale revision or taken username.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Storage or serialization failure.
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    fields: Vec<FieldViolation>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut fields = Vec::new();
        let (status, error_type, message) = match self {
            Self::Validation(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg),
            Self::InvalidRegistration(violations) => {
                let message = violations
                    .iter()
                    .map(|v| v.message)
                    .collect::<Vec<_>>()
                    .join("; ");
                fields = violations;
                (StatusCode::BAD_REQUEST, "validation_error", message)
            }
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            Self::DuplicateKey(msg) => (StatusCode::UNPROCESSABLE_ENTITY, "duplicate_key", msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal server error".to_owned(),
                )
            }
        };

        let body = ErrorBody {
            error: error_type,
            message,
            fields,
        };

        (status, axum::Json(body)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<HierarchyError> for AppError {
    fn from(err: HierarchyError) -> Self {
        match err {
            HierarchyError::Validation { .. } => Self::Validation(err.to_string()),
            HierarchyError::NotFound { .. } => Self::NotFound(err.to_string()),
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::DuplicateKey { .. } => Self::DuplicateKey(err.to_string()),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { .. } => Self::Conflict(err.to_string()),
            StoreError::Serialization { .. } | StoreError::Storage(_) => {
                Self::Internal(err.to_string())
            }
        }
    }
}

impl From<AccountError> for AppError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::Invalid(violations) => Self::InvalidRegistration(violations),
            AccountError::UsernameTaken { .. } => Self::Conflict(err.to_string()),
            AccountError::InvalidCredentials => Self::Unauthorized(err.to_string()),
            AccountError::Serialization { .. } | AccountError::Storage(_) => {
                Self::Internal(err.to_string())
            }
        }
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound => Self::Unauthorized("invalid session".to_owned()),
            SessionError::Expired { .. } => Self::Unauthorized("session expired".to_owned()),
            SessionError::Serialization { .. } | SessionError::Storage(_) => {
                Self::Internal(err.to_string())
            }
        }
    }
}
