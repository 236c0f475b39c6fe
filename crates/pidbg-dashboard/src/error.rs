//! Transport errors and their HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pidbg_engine::EngineError;
use pidbg_telemetry::TelemetryError;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    #[error("Server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type DashboardResult<T> = Result<T, DashboardError>;

impl DashboardError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Engine(EngineError::InvalidReading(_)) => StatusCode::BAD_REQUEST,
            Self::Engine(EngineError::NotAccepting | EngineError::QueueFull) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::Engine(_) | Self::Telemetry(_) | Self::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(error = %self, "Request failed");
        }
        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            DashboardError::BadRequest("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            DashboardError::from(EngineError::InvalidReading("x".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            DashboardError::from(EngineError::NotAccepting).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            DashboardError::from(EngineError::Serialization("x".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
