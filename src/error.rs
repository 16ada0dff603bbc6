/// Unified error types for Plaza
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// When set, internal error details are echoed back to the client
static EXPOSE_INTERNAL_ERRORS: AtomicBool = AtomicBool::new(false);

/// Enable or disable development diagnostics in error responses
pub fn set_expose_internal_errors(enabled: bool) {
    EXPOSE_INTERNAL_ERRORS.store(enabled, Ordering::Relaxed);
}

/// A single offending input field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Main error type for the service
#[derive(Error, Debug)]
pub enum PlazaError {
    /// Malformed or out-of-range input
    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    /// Missing credential or bad login
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Token failed signature, expiry or storage checks
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// Authenticated user has been deactivated
    #[error("Account is disabled")]
    AccountDisabled,

    /// Caller lacks ownership or role for the target
    #[error("Not authorized: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate of a unique relation (already liked, already following)
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Media collaborator rejected or failed an upload
    #[error("Media upload failed: {0}")]
    MediaUpload(String),

    /// Media collaborator storage errors
    #[error("Media storage error: {0}")]
    MediaStorage(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlazaError {
    /// Shorthand for a single-field validation failure
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        PlazaError::Validation(vec![FieldError::new(field, message)])
    }

    pub fn status(&self) -> StatusCode {
        match self {
            PlazaError::Validation(_) => StatusCode::BAD_REQUEST,
            PlazaError::Authentication(_) => StatusCode::UNAUTHORIZED,
            PlazaError::InvalidToken(_) => StatusCode::FORBIDDEN,
            PlazaError::AccountDisabled => StatusCode::FORBIDDEN,
            PlazaError::Forbidden(_) => StatusCode::FORBIDDEN,
            PlazaError::NotFound(_) => StatusCode::NOT_FOUND,
            PlazaError::Conflict(_) => StatusCode::CONFLICT,
            PlazaError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            PlazaError::MediaUpload(_) => StatusCode::BAD_GATEWAY,
            PlazaError::MediaStorage(_)
            | PlazaError::Database(_)
            | PlazaError::Io(_)
            | PlazaError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to the caller
    fn public_message(&self) -> String {
        match self {
            PlazaError::Authentication(msg)
            | PlazaError::InvalidToken(msg)
            | PlazaError::Forbidden(msg)
            | PlazaError::NotFound(msg)
            | PlazaError::Conflict(msg)
            | PlazaError::PayloadTooLarge(msg) => msg.clone(),
            PlazaError::Validation(_) => "Validation failed".to_string(),
            PlazaError::AccountDisabled => "Account is disabled".to_string(),
            PlazaError::MediaUpload(_) => "Image upload failed".to_string(),
            _ => "Internal server error".to_string(), // Don't leak details
        }
    }
}

/// Error envelope returned for every failed request
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl IntoResponse for PlazaError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "request rejected");
        }

        let detail = if status.is_server_error() && EXPOSE_INTERNAL_ERRORS.load(Ordering::Relaxed) {
            Some(self.to_string())
        } else {
            None
        };

        let message = self.public_message();
        let errors = match self {
            PlazaError::Validation(fields) => Some(fields),
            _ => None,
        };

        let body = Json(ErrorEnvelope {
            success: false,
            message,
            errors,
            detail,
        });

        (status, body).into_response()
    }
}

/// Result type alias for service operations
pub type PlazaResult<T> = Result<T, PlazaError>;

/// Map a unique-constraint violation onto a conflict, passing other errors through
pub(crate) fn conflict_on_unique(err: sqlx::Error, message: &str) -> PlazaError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            PlazaError::Conflict(message.to_string())
        }
        _ => PlazaError::Database(err),
    }
}
