//! Prometheus metrics and structured logging for pidbg.
//!
//! - Structured logging with tracing (JSON in production)
//! - Prometheus counters and gauges for the engine, subscribers and samplers

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{init_logging, init_logging_with_filter, DEFAULT_FILTER};
pub use metrics::Metrics;
