//! Source adapters for pidbg.
//!
//! Each adapter samples one part of the device on its own cadence and
//! submits `Reading`s to the engine. A failed sample submits nothing, so
//! the snapshot keeps the previous value.
//!
//! - `gpio`: pin levels through a pluggable `GpioBackend`, change-only
//! - `network`: wifi, bluetooth and interface counters
//! - `system`: cpu, memory, disk, load, temperature and processes
//! - `board`: best-effort board identification at startup

pub mod board;
pub mod error;
pub mod gpio;
pub mod network;
pub mod runner;
pub mod system;

pub use board::detect_board;
pub use error::{SourceError, SourceResult};
pub use gpio::{
    select_backend, GpioBackend, GpioBackendKind, PinSampler, SimulatedGpioBackend,
    DEFAULT_GPIO_PINS,
};
pub use network::NetworkSampler;
pub use runner::{spawn_sampler, Sampler};
pub use system::SystemSampler;
