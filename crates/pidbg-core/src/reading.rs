//! Readings: timestamped observations handed to the engine by source adapters.
//!
//! A `Reading` is immutable once produced. Each variant carries its own
//! capture timestamp; the engine stamps the matching snapshot field with it.

use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;

/// Direction a pin is configured for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinMode {
    #[default]
    In,
    Out,
}

/// Pull resistor configuration of an input pin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PullMode {
    Up,
    Down,
    #[default]
    #[serde(rename = "none")]
    Floating,
}

/// Digital level of one GPIO pin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinState {
    pub pin: u8,
    /// 0 (low) or 1 (high).
    pub value: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub mode: PinMode,
    #[serde(default)]
    pub pull: PullMode,
    pub timestamp: DateTime<Utc>,
}

impl PinState {
    pub fn new(pin: u8, value: u8) -> Self {
        Self {
            pin,
            value,
            label: None,
            mode: PinMode::In,
            pull: PullMode::Floating,
            timestamp: Utc::now(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_pull(mut self, pull: PullMode) -> Self {
        self.pull = pull;
        self
    }

    pub fn is_high(&self) -> bool {
        self.value == 1
    }
}

/// Wireless LAN association state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiStatus {
    pub connected: bool,
    pub ssid: Option<String>,
    pub ip_address: Option<String>,
    /// Signal level in dBm, when the driver reports one.
    pub signal_level_dbm: Option<i32>,
    pub timestamp: DateTime<Utc>,
}

impl WifiStatus {
    /// Status reported when no association could be observed.
    pub fn disconnected() -> Self {
        Self {
            connected: false,
            ssid: None,
            ip_address: None,
            signal_level_dbm: None,
            timestamp: Utc::now(),
        }
    }

    pub fn connected(ssid: impl Into<String>, signal_level_dbm: Option<i32>) -> Self {
        Self {
            connected: true,
            ssid: Some(ssid.into()),
            ip_address: None,
            signal_level_dbm,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BluetoothStatus {
    pub powered: bool,
    pub connected: bool,
    pub timestamp: DateTime<Utc>,
}

impl BluetoothStatus {
    pub fn new(powered: bool, connected: bool) -> Self {
        Self {
            powered,
            connected,
            timestamp: Utc::now(),
        }
    }
}

/// One entry of the top-processes list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: Option<String>,
    pub cpu_percent: Option<f64>,
}

/// Host resource usage.
///
/// Only `cpu_percent` and `disk_used_percent` are always available;
/// everything else depends on what the platform exposes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemHealth {
    pub cpu_temp_c: Option<f64>,
    pub cpu_percent: f64,
    pub disk_used_percent: f64,
    #[serde(default)]
    pub memory_percent: Option<f64>,
    #[serde(default)]
    pub swap_percent: Option<f64>,
    #[serde(default)]
    pub load_1: Option<f64>,
    #[serde(default)]
    pub load_5: Option<f64>,
    #[serde(default)]
    pub load_15: Option<f64>,
    #[serde(default)]
    pub uptime_s: Option<u64>,
    #[serde(default)]
    pub boot_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub process_count: Option<usize>,
    /// Busiest processes by cpu, at most three.
    #[serde(default)]
    pub top_processes: Option<Vec<ProcessInfo>>,
    pub timestamp: DateTime<Utc>,
}

impl SystemHealth {
    pub fn new(cpu_percent: f64, disk_used_percent: f64) -> Self {
        Self {
            cpu_temp_c: None,
            cpu_percent,
            disk_used_percent,
            memory_percent: None,
            swap_percent: None,
            load_1: None,
            load_5: None,
            load_15: None,
            uptime_s: None,
            boot_time: None,
            process_count: None,
            top_processes: None,
            timestamp: Utc::now(),
        }
    }

    fn check_finite(&self) -> CoreResult<()> {
        let required = [
            ("cpu_percent", Some(self.cpu_percent)),
            ("disk_used_percent", Some(self.disk_used_percent)),
        ];
        let optional = [
            ("cpu_temp_c", self.cpu_temp_c),
            ("memory_percent", self.memory_percent),
            ("swap_percent", self.swap_percent),
            ("load_1", self.load_1),
            ("load_5", self.load_5),
            ("load_15", self.load_15),
        ];
        for (field, value) in required.iter().chain(optional.iter()) {
            if let Some(v) = value {
                if !v.is_finite() {
                    return Err(CoreError::invalid(
                        "system",
                        format!("{field} is not a finite number"),
                    ));
                }
            }
        }
        let procs = self.top_processes.iter().flatten();
        if procs
            .filter_map(|p| p.cpu_percent)
            .any(|v| !v.is_finite())
        {
            return Err(CoreError::invalid(
                "system",
                "top process cpu_percent is not a finite number",
            ));
        }
        Ok(())
    }
}

/// Counters for one network interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceStats {
    pub name: String,
    pub is_up: bool,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub rx_errs: u64,
    pub tx_errs: u64,
}

/// Complete set of interfaces observed in one sampling period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceSet {
    pub interfaces: Vec<InterfaceStats>,
    pub timestamp: DateTime<Utc>,
}

impl InterfaceSet {
    pub fn new(interfaces: Vec<InterfaceStats>) -> Self {
        Self {
            interfaces,
            timestamp: Utc::now(),
        }
    }
}

/// Application-pushed value for a named stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomEntry {
    pub name: String,
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
}

impl CustomEntry {
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
            timestamp: Utc::now(),
        }
    }
}

/// Discriminant of a `Reading`, used for logging and metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadingKind {
    Pin,
    Wifi,
    Bluetooth,
    System,
    InterfaceSet,
    Custom,
}

impl ReadingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadingKind::Pin => "pin",
            ReadingKind::Wifi => "wifi",
            ReadingKind::Bluetooth => "bluetooth",
            ReadingKind::System => "system",
            ReadingKind::InterfaceSet => "interface_set",
            ReadingKind::Custom => "custom",
        }
    }
}

impl fmt::Display for ReadingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observation from a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "reading", rename_all = "snake_case")]
pub enum Reading {
    Pin(PinState),
    Wifi(WifiStatus),
    Bluetooth(BluetoothStatus),
    System(SystemHealth),
    InterfaceSet(InterfaceSet),
    Custom(CustomEntry),
}

impl Reading {
    pub fn kind(&self) -> ReadingKind {
        match self {
            Reading::Pin(_) => ReadingKind::Pin,
            Reading::Wifi(_) => ReadingKind::Wifi,
            Reading::Bluetooth(_) => ReadingKind::Bluetooth,
            Reading::System(_) => ReadingKind::System,
            Reading::InterfaceSet(_) => ReadingKind::InterfaceSet,
            Reading::Custom(_) => ReadingKind::Custom,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Reading::Pin(r) => r.timestamp,
            Reading::Wifi(r) => r.timestamp,
            Reading::Bluetooth(r) => r.timestamp,
            Reading::System(r) => r.timestamp,
            Reading::InterfaceSet(r) => r.timestamp,
            Reading::Custom(r) => r.timestamp,
        }
    }

    /// Whether applying this reading requires recomputing health flags.
    pub fn affects_health(&self) -> bool {
        matches!(self, Reading::System(_) | Reading::Wifi(_))
    }

    /// Check the contract a reading must satisfy before it is applied.
    pub fn validate(&self) -> CoreResult<()> {
        match self {
            Reading::Pin(p) if p.value > 1 => Err(CoreError::invalid(
                "pin",
                format!("pin {} has value {}, expected 0 or 1", p.pin, p.value),
            )),
            Reading::System(s) => s.check_finite(),
            Reading::InterfaceSet(set) => {
                let mut seen = HashSet::with_capacity(set.interfaces.len());
                for iface in &set.interfaces {
                    if iface.name.is_empty() {
                        return Err(CoreError::invalid("interface_set", "empty interface name"));
                    }
                    if !seen.insert(iface.name.as_str()) {
                        return Err(CoreError::invalid(
                            "interface_set",
                            format!("duplicate interface {}", iface.name),
                        ));
                    }
                }
                Ok(())
            }
            Reading::Custom(c) if c.name.trim().is_empty() => {
                Err(CoreError::invalid("custom", "empty stream name"))
            }
            Reading::Custom(c) if !c.payload.is_object() => Err(CoreError::invalid(
                "custom",
                format!("payload for {} is not a JSON object", c.name),
            )),
            _ => Ok(()),
        }
    }
}

impl From<PinState> for Reading {
    fn from(v: PinState) -> Self {
        Reading::Pin(v)
    }
}

impl From<WifiStatus> for Reading {
    fn from(v: WifiStatus) -> Self {
        Reading::Wifi(v)
    }
}

impl From<BluetoothStatus> for Reading {
    fn from(v: BluetoothStatus) -> Self {
        Reading::Bluetooth(v)
    }
}

impl From<SystemHealth> for Reading {
    fn from(v: SystemHealth) -> Self {
        Reading::System(v)
    }
}

impl From<InterfaceSet> for Reading {
    fn from(v: InterfaceSet) -> Self {
        Reading::InterfaceSet(v)
    }
}

impl From<CustomEntry> for Reading {
    fn from(v: CustomEntry) -> Self {
        Reading::Custom(v)
    }
}
