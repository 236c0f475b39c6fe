//! Source adapter error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("GPIO error: {0}")]
    Gpio(String),

    #[error("Pin {0} is not configured")]
    PinNotConfigured(u8),

    #[error("Unknown GPIO backend: {0}")]
    UnknownBackend(String),

    #[error("Sampling task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(feature = "hardware")]
impl From<rppal::gpio::Error> for SourceError {
    fn from(e: rppal::gpio::Error) -> Self {
        Self::Gpio(e.to_string())
    }
}

pub type SourceResult<T> = Result<T, SourceError>;
