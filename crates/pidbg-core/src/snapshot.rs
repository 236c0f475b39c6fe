//! The aggregate current-state document.

use crate::health::HealthFlags;
use crate::reading::{
    BluetoothStatus, CustomEntry, InterfaceStats, PinMode, PinState, PullMode, SystemHealth,
    WifiStatus,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Best-effort description of the board the debugger runs on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardInfo {
    pub name: Option<String>,
    pub revision: Option<String>,
    pub serial: Option<String>,
    pub cpu_arch: Option<String>,
    pub os: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppInfo {
    pub debugger_version: String,
    pub runtime_version: String,
}

impl Default for AppInfo {
    fn default() -> Self {
        Self {
            debugger_version: "unknown".to_string(),
            runtime_version: "unknown".to_string(),
        }
    }
}

/// Which samplers are enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Capabilities {
    pub gpio: bool,
    pub wifi: bool,
    pub bluetooth: bool,
    pub system_health: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            gpio: true,
            wifi: true,
            bluetooth: true,
            system_health: true,
        }
    }
}

/// Static description of a monitored pin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinDefinition {
    pub pin: u8,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub mode: PinMode,
    #[serde(default)]
    pub pull: PullMode,
}

impl PinDefinition {
    pub fn input(pin: u8) -> Self {
        Self {
            pin,
            label: None,
            mode: PinMode::In,
            pull: PullMode::Floating,
        }
    }
}

/// Current device state.
///
/// `None` on `wifi`, `bluetooth` and `system` means no reading has been
/// committed yet. A pin key is present only once that pin has reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub pins: BTreeMap<u8, PinState>,
    pub wifi: Option<WifiStatus>,
    pub bluetooth: Option<BluetoothStatus>,
    pub system: Option<SystemHealth>,
    pub interfaces: Vec<InterfaceStats>,
    pub interfaces_updated_at: Option<DateTime<Utc>>,
    pub custom: BTreeMap<String, CustomEntry>,
    pub health: HealthFlags,
    pub board: BoardInfo,
    pub app: AppInfo,
    pub gpio_schema: BTreeMap<u8, PinDefinition>,
    /// Number of readings committed since start.
    pub seq: u64,
}

impl Snapshot {
    pub fn new(board: BoardInfo, app: AppInfo, gpio_schema: BTreeMap<u8, PinDefinition>) -> Self {
        Self {
            pins: BTreeMap::new(),
            wifi: None,
            bluetooth: None,
            system: None,
            interfaces: Vec::new(),
            interfaces_updated_at: None,
            custom: BTreeMap::new(),
            health: HealthFlags::default(),
            board,
            app,
            gpio_schema,
            seq: 0,
        }
    }

    /// Look up an interface by name.
    pub fn interface(&self, name: &str) -> Option<&InterfaceStats> {
        self.interfaces.iter().find(|i| i.name == name)
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::new(BoardInfo::default(), AppInfo::default(), BTreeMap::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_snapshot_is_unknown() {
        let snap = Snapshot::default();
        assert!(snap.pins.is_empty());
        assert!(snap.wifi.is_none());
        assert!(snap.system.is_none());
        assert_eq!(snap.seq, 0);

        let v = serde_json::to_value(&snap).unwrap();
        assert!(v["wifi"].is_null());
        assert_eq!(v["pins"], serde_json::json!({}));
    }

    #[test]
    fn test_interface_lookup() {
        let mut snap = Snapshot::default();
        snap.interfaces.push(InterfaceStats {
            name: "wlan0".into(),
            is_up: true,
            rx_bytes: 10,
            tx_bytes: 20,
            rx_errs: 0,
            tx_errs: 0,
        });
        assert_eq!(snap.interface("wlan0").map(|i| i.rx_bytes), Some(10));
        assert!(snap.interface("eth0").is_none());
    }
}
