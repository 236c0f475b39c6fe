//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Engine error: {0}")]
    Engine(#[from] pidbg_engine::EngineError),

    #[error("Source error: {0}")]
    Source(#[from] pidbg_sources::SourceError),

    #[error("Dashboard error: {0}")]
    Dashboard(#[from] pidbg_dashboard::DashboardError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] pidbg_telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
