/// Structured error types for reportdesk-core.
///
/// Uses `thiserror` so the server crate can match on variants; the binary
/// wraps everything in `anyhow` at the top level.
use thiserror::Error;

use crate::models::ValidationError;

/// Main error type for reportdesk-core operations
#[derive(Error, Debug)]
pub enum CoreError {
    /// User input failed validation
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// JSON parsing or serialization failed
    #[error("JSON error at {context}: {source}")]
    Json {
        context: String,
        source: serde_json::Error,
    },
}

impl CoreError {
    /// Create a JSON error with context
    pub fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            context: context.into(),
            source,
        }
    }
}
