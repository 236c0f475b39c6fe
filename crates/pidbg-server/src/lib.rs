//! pidbg - Raspberry Pi device-state debugger.
//!
//! Wires the pieces into one process:
//! - Samplers for GPIO, network and system health
//! - The aggregation engine (snapshot, health flags, ordered broadcast)
//! - The HTTP/WebSocket dashboard

pub mod app;
pub mod cli;
pub mod config;
pub mod error;

pub use app::{app_info, Application};
pub use cli::Cli;
pub use config::{AppConfig, ConfigSource, GpioLabel, SourcesConfig, TelemetryConfig};
pub use error::{AppError, AppResult};
