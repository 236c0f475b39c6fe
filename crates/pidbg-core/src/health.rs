//! Health evaluation.
//!
//! Derives boolean health flags from the latest system and wifi readings
//! against static thresholds. Pure and deterministic.

use crate::reading::{SystemHealth, WifiStatus};
use serde::{Deserialize, Serialize};

/// Alerting thresholds. Immutable once the engine is started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// CPU temperature above which `cpu_hot` is raised.
    pub cpu_temp_max_c: f64,
    /// Disk usage percentage above which `disk_low` is raised.
    pub disk_used_max_pct: f64,
    /// Memory usage percentage above which `memory_high` is raised.
    pub memory_used_max_pct: f64,
    /// Signal level below which a connected link is `wifi_poor`.
    pub wifi_signal_min_dbm: i32,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            cpu_temp_max_c: 80.0,
            disk_used_max_pct: 90.0,
            memory_used_max_pct: 90.0,
            wifi_signal_min_dbm: -75,
        }
    }
}

/// Derived health flags. All false until the relevant readings arrive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthFlags {
    pub cpu_hot: bool,
    pub disk_low: bool,
    pub memory_high: bool,
    pub wifi_poor: bool,
}

impl HealthFlags {
    pub fn any(&self) -> bool {
        self.cpu_hot || self.disk_low || self.memory_high || self.wifi_poor
    }
}

/// Evaluate health flags. Unknown inputs never raise a flag.
pub fn evaluate(
    system: Option<&SystemHealth>,
    wifi: Option<&WifiStatus>,
    thresholds: &ThresholdConfig,
) -> HealthFlags {
    let mut flags = HealthFlags::default();

    if let Some(sys) = system {
        flags.cpu_hot = sys
            .cpu_temp_c
            .is_some_and(|t| t > thresholds.cpu_temp_max_c);
        flags.disk_low = sys.disk_used_percent > thresholds.disk_used_max_pct;
        flags.memory_high = sys
            .memory_percent
            .is_some_and(|m| m > thresholds.memory_used_max_pct);
    }

    if let Some(w) = wifi {
        flags.wifi_poor = w.connected
            && w
                .signal_level_dbm
                .is_some_and(|s| s < thresholds.wifi_signal_min_dbm);
    }

    flags
}

#[cfg(test)]
mod tests {
    use super::*;

    fn system(temp: Option<f64>, disk: f64, mem: Option<f64>) -> SystemHealth {
        let mut s = SystemHealth::new(5.0, disk);
        s.cpu_temp_c = temp;
        s.memory_percent = mem;
        s
    }

    #[test]
    fn test_nothing_known_is_healthy() {
        let flags = evaluate(None, None, &ThresholdConfig::default());
        assert_eq!(flags, HealthFlags::default());
        assert!(!flags.any());
    }

    #[test]
    fn test_hot_and_poor_signal() {
        let th = ThresholdConfig::default();
        let sys = system(Some(85.0), 10.0, Some(10.0));
        let wifi = WifiStatus::connected("lab", Some(-80));
        let flags = evaluate(Some(&sys), Some(&wifi), &th);
        assert_eq!(
            flags,
            HealthFlags {
                cpu_hot: true,
                disk_low: false,
                memory_high: false,
                wifi_poor: true,
            }
        );
    }

    #[test]
    fn test_thresholds_are_strict() {
        let th = ThresholdConfig::default();
        let sys = system(Some(80.0), 90.0, Some(90.0));
        let wifi = WifiStatus::connected("lab", Some(-75));
        let flags = evaluate(Some(&sys), Some(&wifi), &th);
        assert!(!flags.any());
    }

    #[test]
    fn test_unknown_temperature_is_not_hot() {
        let th = ThresholdConfig::default();
        let sys = system(None, 95.0, Some(95.0));
        let flags = evaluate(Some(&sys), None, &th);
        assert!(!flags.cpu_hot);
        assert!(flags.disk_low);
        assert!(flags.memory_high);
    }

    #[test]
    fn test_disconnected_wifi_is_not_poor() {
        let th = ThresholdConfig::default();
        let mut wifi = WifiStatus::disconnected();
        wifi.signal_level_dbm = Some(-90);
        assert!(!evaluate(None, Some(&wifi), &th).wifi_poor);

        let unknown_signal = WifiStatus::connected("lab", None);
        assert!(!evaluate(None, Some(&unknown_signal), &th).wifi_poor);
    }

    #[test]
    fn test_threshold_partial_deserialize() {
        let th: ThresholdConfig = serde_json::from_str(r#"{"cpu_temp_max_c": 70.0}"#).unwrap();
        assert_eq!(th.cpu_temp_max_c, 70.0);
        assert_eq!(th.wifi_signal_min_dbm, -75);
    }
}
