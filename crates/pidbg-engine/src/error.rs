//! Engine error types.

use pidbg_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Engine is not accepting submissions")]
    NotAccepting,

    #[error("Intake queue is full")]
    QueueFull,

    #[error("Invalid reading: {0}")]
    InvalidReading(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),
}

impl From<CoreError> for EngineError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::InvalidReading { .. } => Self::InvalidReading(e.to_string()),
            CoreError::Json(inner) => Self::Serialization(inner.to_string()),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
