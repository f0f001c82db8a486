//! API error types with IntoResponse
//!
//! Errors are converted to JSON responses with appropriate status codes.
//! Validation failures use the `{message, errors: {field: [..]}}` bag the
//! web client renders next to form fields.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use reportdesk_core::models::ValidationError;

use crate::auth::AuthError;
use crate::db::DbError;
use crate::render::RenderError;
use crate::storage::StorageError;

/// Message for missing or unknown bearer tokens
pub const UNAUTHENTICATED: &str = "Unauthenticated.";

/// Message for ownership failures
pub const UNAUTHORIZED_ACTION: &str = "This action is unauthorized.";

/// API error type with automatic HTTP status mapping
#[derive(Debug)]
pub enum ApiError {
    /// Validation failed (422)
    Validation(ValidationError),

    /// Malformed request body (400)
    BadRequest(String),

    /// Missing or invalid credentials (401)
    Unauthenticated { message: String },

    /// Authenticated but not allowed (403)
    Forbidden { message: String },

    /// Resource not found (404)
    NotFound { resource: &'static str, id: String },

    /// Method override to something other than PUT (405)
    MethodNotAllowed,

    /// Unique-constraint race (409)
    Conflict(String),

    /// Renderer failed or timed out (500)
    Render(RenderError),

    /// Database error (500, logged)
    Database(DbError),

    /// Internal error (500, logged)
    Internal { message: String },
}

impl ApiError {
    pub fn unauthenticated() -> Self {
        Self::Unauthenticated {
            message: UNAUTHENTICATED.to_string(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Render(_) | Self::Database(_) | Self::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::Validation(e) => json!({
                "message": e.to_string(),
                "errors": { e.field(): [e.to_string()] }
            }),
            Self::BadRequest(message) => json!({ "message": message }),
            Self::Unauthenticated { message } | Self::Forbidden { message } => {
                json!({ "message": message })
            }
            Self::NotFound { resource, id } => json!({
                "message": format!("{} '{}' not found", resource, id)
            }),
            Self::MethodNotAllowed => json!({ "message": "method not allowed" }),
            Self::Conflict(message) => json!({ "message": message }),
            Self::Render(e) => {
                tracing::error!(error = %e, "report generation failed");
                json!({
                    "message": "Report generation failed",
                    "error": e.to_string()
                })
            }
            Self::Database(e) => {
                // Log the actual error, return generic message
                tracing::error!("Database error: {}", e);
                json!({ "message": "an internal error occurred" })
            }
            Self::Internal { message } => {
                tracing::error!("Internal error: {}", message);
                json!({ "message": "an internal error occurred" })
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound { resource, id } => Self::NotFound { resource, id },
            DbError::Conflict(message) => Self::Conflict(message),
            _ => Self::Database(e),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Db(e) => e.into(),
            other => Self::internal(other.to_string()),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        Self::internal(e.to_string())
    }
}

impl From<RenderError> for ApiError {
    fn from(e: RenderError) -> Self {
        Self::Render(e)
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::internal(format!("blocking task failed: {e}"))
    }
}
