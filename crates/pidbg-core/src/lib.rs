//! Core domain types for the pidbg device debugger.
//!
//! This crate provides the data model shared by the engine, the source
//! adapters and the transport layer:
//! - `Reading`: one timestamped observation from a source, tagged by kind
//! - `Snapshot`: the aggregate current-state document
//! - `Event`: the broadcast-ready wrapper sent to subscribers
//! - `health`: threshold configuration and the pure health evaluator

pub mod error;
pub mod event;
pub mod health;
pub mod reading;
pub mod snapshot;

pub use error::{CoreError, CoreResult};
pub use event::{Event, EventKind, MetaPayload};
pub use health::{evaluate, HealthFlags, ThresholdConfig};
pub use reading::{
    BluetoothStatus, CustomEntry, InterfaceSet, InterfaceStats, PinMode, PinState, ProcessInfo,
    PullMode, Reading, ReadingKind, SystemHealth, WifiStatus,
};
pub use snapshot::{AppInfo, BoardInfo, Capabilities, PinDefinition, Snapshot};
