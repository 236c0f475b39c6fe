//! GPIO pin sampling.
//!
//! Pins are polled rather than watched through interrupts so behaviour is
//! the same on every board. A `Pin` reading is submitted only when a pin's
//! level differs from the previous poll; the first poll always reports.

use crate::error::{SourceError, SourceResult};
use crate::runner::Sampler;
use parking_lot::Mutex;
use pidbg_core::{PinDefinition, PinState, PullMode, Reading};
use pidbg_telemetry::Metrics;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// BCM pins monitored when none are configured.
pub const DEFAULT_GPIO_PINS: [u8; 10] = [2, 3, 4, 17, 18, 22, 23, 24, 25, 27];

/// Board-specific GPIO access.
#[cfg_attr(test, mockall::automock)]
pub trait GpioBackend: Send {
    fn name(&self) -> &'static str;

    /// Configure `pin` as an input with the given pull resistor.
    fn setup_input(&mut self, pin: u8, pull: PullMode) -> SourceResult<()>;

    /// Current level of `pin`, 0 or 1.
    fn read(&mut self, pin: u8) -> SourceResult<u8>;

    /// Release all pins.
    fn cleanup(&mut self);
}

/// Backend for machines without GPIO and for tests.
///
/// Reads 0 unless a pin has scripted levels; scripted levels are returned
/// one per read and the last one repeats.
#[derive(Debug, Default)]
pub struct SimulatedGpioBackend {
    scripts: HashMap<u8, VecDeque<u8>>,
    last: HashMap<u8, u8>,
}

impl SimulatedGpioBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(mut self, pin: u8, levels: impl IntoIterator<Item = u8>) -> Self {
        self.scripts.entry(pin).or_default().extend(levels);
        self
    }
}

impl GpioBackend for SimulatedGpioBackend {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn setup_input(&mut self, _pin: u8, _pull: PullMode) -> SourceResult<()> {
        Ok(())
    }

    fn read(&mut self, pin: u8) -> SourceResult<u8> {
        if let Some(level) = self.scripts.get_mut(&pin).and_then(|s| s.pop_front()) {
            self.last.insert(pin, level);
            return Ok(level);
        }
        Ok(self.last.get(&pin).copied().unwrap_or(0))
    }

    fn cleanup(&mut self) {}
}

#[cfg(feature = "hardware")]
mod hardware {
    use super::*;
    use rppal::gpio::{Gpio, InputPin, Level};

    /// Raspberry Pi GPIO through rppal.
    pub struct RppalGpioBackend {
        gpio: Gpio,
        pins: HashMap<u8, InputPin>,
    }

    impl RppalGpioBackend {
        pub fn new() -> SourceResult<Self> {
            Ok(Self {
                gpio: Gpio::new()?,
                pins: HashMap::new(),
            })
        }
    }

    impl GpioBackend for RppalGpioBackend {
        fn name(&self) -> &'static str {
            "rppal"
        }

        fn setup_input(&mut self, pin: u8, pull: PullMode) -> SourceResult<()> {
            let io = self.gpio.get(pin)?;
            let input = match pull {
                PullMode::Up => io.into_input_pullup(),
                PullMode::Down => io.into_input_pulldown(),
                PullMode::Floating => io.into_input(),
            };
            self.pins.insert(pin, input);
            Ok(())
        }

        fn read(&mut self, pin: u8) -> SourceResult<u8> {
            let input = self
                .pins
                .get(&pin)
                .ok_or(SourceError::PinNotConfigured(pin))?;
            Ok(match input.read() {
                Level::High => 1,
                Level::Low => 0,
            })
        }

        fn cleanup(&mut self) {
            // Dropping an InputPin restores its previous mode.
            self.pins.clear();
        }
    }
}

#[cfg(feature = "hardware")]
pub use hardware::RppalGpioBackend;

/// Which backend to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GpioBackendKind {
    /// Real GPIO when available, otherwise simulated.
    #[default]
    Auto,
    Mock,
    Rppal,
}

impl FromStr for GpioBackendKind {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "mock" => Ok(Self::Mock),
            "rppal" => Ok(Self::Rppal),
            other => Err(SourceError::UnknownBackend(other.to_string())),
        }
    }
}

impl fmt::Display for GpioBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Auto => "auto",
            Self::Mock => "mock",
            Self::Rppal => "rppal",
        };
        f.write_str(s)
    }
}

/// Build the backend for `kind`.
///
/// `Auto` falls back to the simulated backend when real GPIO is not
/// available; `Rppal` fails instead.
pub fn select_backend(kind: GpioBackendKind) -> SourceResult<Box<dyn GpioBackend>> {
    match kind {
        GpioBackendKind::Mock => Ok(Box::new(SimulatedGpioBackend::new())),
        #[cfg(feature = "hardware")]
        GpioBackendKind::Rppal => Ok(Box::new(RppalGpioBackend::new()?)),
        #[cfg(not(feature = "hardware"))]
        GpioBackendKind::Rppal => Err(SourceError::Gpio(
            "built without the `hardware` feature".to_string(),
        )),
        GpioBackendKind::Auto => {
            let fallback = || Box::new(SimulatedGpioBackend::new()) as Box<dyn GpioBackend>;
            Ok(hardware_backend().unwrap_or_else(fallback))
        }
    }
}

#[cfg(feature = "hardware")]
fn hardware_backend() -> Option<Box<dyn GpioBackend>> {
    match RppalGpioBackend::new() {
        Ok(backend) => Some(Box::new(backend) as Box<dyn GpioBackend>),
        Err(e) => {
            warn!(error = %e, "GPIO unavailable, using simulated backend");
            None
        }
    }
}

#[cfg(not(feature = "hardware"))]
fn hardware_backend() -> Option<Box<dyn GpioBackend>> {
    None
}

/// Change-only pin sampler.
pub struct PinSampler {
    backend: Arc<Mutex<Box<dyn GpioBackend>>>,
    pins: Vec<PinDefinition>,
    last: HashMap<u8, u8>,
}

impl PinSampler {
    pub fn new(backend: Box<dyn GpioBackend>, pins: Vec<PinDefinition>) -> Self {
        Self {
            backend: Arc::new(Mutex::new(backend)),
            pins,
            last: HashMap::new(),
        }
    }

    /// Configure every monitored pin as an input.
    ///
    /// A pin that cannot be configured is logged and left out of polling.
    pub async fn setup(&mut self) -> SourceResult<()> {
        let backend = self.backend.clone();
        let pins = self.pins.clone();
        let configured = tokio::task::spawn_blocking(move || {
            let mut backend = backend.lock();
            info!(backend = backend.name(), pins = pins.len(), "Configuring GPIO inputs");
            pins.into_iter()
                .filter(|def| match backend.setup_input(def.pin, def.pull) {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(pin = def.pin, error = %e, "Pin setup failed, not monitoring");
                        false
                    }
                })
                .collect::<Vec<_>>()
        })
        .await?;
        self.pins = configured;
        Ok(())
    }

    pub fn pins(&self) -> &[PinDefinition] {
        &self.pins
    }

    /// Compare fresh levels against the previous poll.
    fn changes(&mut self, levels: Vec<(u8, u8)>) -> Vec<PinState> {
        let mut changed = Vec::new();
        for (pin, value) in levels {
            if self.last.insert(pin, value) == Some(value) {
                continue;
            }
            let Some(def) = self.pins.iter().find(|d| d.pin == pin) else {
                continue;
            };
            let mut state = PinState::new(pin, value).with_pull(def.pull);
            state.mode = def.mode;
            state.label = def.label.clone();
            changed.push(state);
        }
        changed
    }
}

impl Sampler for PinSampler {
    fn name(&self) -> &'static str {
        "gpio"
    }

    async fn sample(&mut self) -> SourceResult<Vec<Reading>> {
        let backend = self.backend.clone();
        let pins: Vec<u8> = self.pins.iter().map(|d| d.pin).collect();
        let results = tokio::task::spawn_blocking(move || {
            let mut backend = backend.lock();
            pins.into_iter()
                .map(|pin| (pin, backend.read(pin)))
                .collect::<Vec<_>>()
        })
        .await?;

        let mut levels = Vec::with_capacity(results.len());
        for (pin, result) in results {
            match result {
                Ok(value) => levels.push((pin, value)),
                Err(e) => {
                    debug!(pin, error = %e, "Pin read failed");
                    Metrics::source_failure("gpio");
                }
            }
        }
        Ok(self
            .changes(levels)
            .into_iter()
            .map(Reading::Pin)
            .collect())
    }

    fn stop(&mut self) {
        self.backend.lock().cleanup();
    }
}
