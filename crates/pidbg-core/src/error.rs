//! Error types for pidbg-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid {kind} reading: {reason}")]
    InvalidReading { kind: &'static str, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    /// Build an `InvalidReading` error.
    pub fn invalid(kind: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidReading {
            kind,
            reason: reason.into(),
        }
    }
}

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
