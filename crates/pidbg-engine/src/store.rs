//! Snapshot store.
//!
//! Owns the one canonical `Snapshot`. `apply` is crate-private and only the
//! dispatcher task calls it, so there is never more than one writer. Readers
//! take a clone under the read lock and never see a half-applied reading.

use crate::error::EngineResult;
use parking_lot::RwLock;
use pidbg_core::{evaluate, Event, HealthFlags, Reading, Snapshot, ThresholdConfig};
use pidbg_telemetry::Metrics;
use tracing::trace;

pub struct SnapshotStore {
    state: RwLock<Snapshot>,
    thresholds: ThresholdConfig,
}

impl SnapshotStore {
    pub fn new(initial: Snapshot, thresholds: ThresholdConfig) -> Self {
        Self {
            state: RwLock::new(initial),
            thresholds,
        }
    }

    /// Consistent copy of the current snapshot.
    pub fn read(&self) -> Snapshot {
        self.state.read().clone()
    }

    /// Number of readings committed so far.
    pub fn seq(&self) -> u64 {
        self.state.read().seq
    }

    pub fn health(&self) -> HealthFlags {
        self.state.read().health
    }

    pub fn thresholds(&self) -> &ThresholdConfig {
        &self.thresholds
    }

    /// Validate and commit one reading, returning the event to broadcast.
    ///
    /// The event is built under the write lock before the snapshot is
    /// mutated, so a failure leaves the snapshot untouched.
    pub(crate) fn apply(&self, mut reading: Reading) -> EngineResult<Option<Event>> {
        reading.validate()?;

        let (event, health) = {
            let mut state = self.state.write();

            if let Reading::Pin(pin) = &mut reading {
                if pin.label.is_none() {
                    pin.label = state
                        .gpio_schema
                        .get(&pin.pin)
                        .and_then(|def| def.label.clone());
                }
            }

            let seq = state.seq + 1;
            let event = Event::from_reading(&reading, seq)?;
            let affects_health = reading.affects_health();

            match reading {
                Reading::Pin(pin) => {
                    state.pins.insert(pin.pin, pin);
                }
                Reading::Wifi(wifi) => state.wifi = Some(wifi),
                Reading::Bluetooth(bt) => state.bluetooth = Some(bt),
                Reading::System(sys) => state.system = Some(sys),
                Reading::InterfaceSet(set) => {
                    state.interfaces = set.interfaces;
                    state.interfaces_updated_at = Some(set.timestamp);
                }
                Reading::Custom(entry) => {
                    state.custom.insert(entry.name.clone(), entry);
                }
            }

            if affects_health {
                state.health =
                    evaluate(state.system.as_ref(), state.wifi.as_ref(), &self.thresholds);
            }
            state.seq = seq;
            trace!(seq, "Reading committed");

            (event, affects_health.then_some(state.health))
        };

        if let Some(flags) = health {
            Metrics::health_flag("cpu_hot", flags.cpu_hot);
            Metrics::health_flag("disk_low", flags.disk_low);
            Metrics::health_flag("memory_high", flags.memory_high);
            Metrics::health_flag("wifi_poor", flags.wifi_poor);
        }
        Ok(event)
    }
}
