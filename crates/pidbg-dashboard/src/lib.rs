//! pidbg-dashboard - HTTP and WebSocket transport for the pidbg engine.
//!
//! ```text
//! GET  /status             -> current Snapshot as JSON
//! GET  /ws                 -> live Event stream, one JSON text frame per event
//! POST /api/custom/{name}  -> push an application value (JSON object body)
//! GET  /metrics            -> Prometheus text exposition
//! ```
//!
//! A WebSocket client may send the text frame `snapshot` at any time to get
//! a fresh `snapshot` event on its own connection.
//!
//! # Usage
//!
//! ```ignore
//! use pidbg_dashboard::{run_server, AppState, DashboardConfig};
//!
//! let config = DashboardConfig::default();
//! let state = AppState::new(engine.gateway(), engine.handle(), &config);
//! run_server(state, &config, cancel.cancelled_owned()).await?;
//! ```

mod config;
mod error;
mod server;

pub use config::DashboardConfig;
pub use error::{DashboardError, DashboardResult};
pub use server::{
    create_router, run_server, serve, AppState, ConnectionGuard, ConnectionLimiter,
    SNAPSHOT_REQUEST,
};
