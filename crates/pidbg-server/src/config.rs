//! Application configuration.

use crate::error::{AppError, AppResult};
use pidbg_core::{Capabilities, PinDefinition, ThresholdConfig};
use pidbg_dashboard::DashboardConfig;
use pidbg_engine::EngineConfig;
use pidbg_sources::{GpioBackendKind, DEFAULT_GPIO_PINS};
use pidbg_telemetry::DEFAULT_FILTER;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file used when neither `--config` nor `PIDBG_CONFIG` is given.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Human-readable purpose of a pin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpioLabel {
    pub pin: u8,
    pub label: String,
}

/// Which samplers run and how often.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "default_true")]
    pub gpio_enabled: bool,
    #[serde(default = "default_true")]
    pub wifi_enabled: bool,
    #[serde(default = "default_true")]
    pub bluetooth_enabled: bool,
    #[serde(default = "default_true")]
    pub system_health_enabled: bool,
    #[serde(default = "default_gpio_poll_interval_ms")]
    pub gpio_poll_interval_ms: u64,
    #[serde(default = "default_slow_poll_interval_ms")]
    pub network_poll_interval_ms: u64,
    #[serde(default = "default_slow_poll_interval_ms")]
    pub system_poll_interval_ms: u64,
    #[serde(default = "default_gpio_pins")]
    pub gpio_pins: Vec<u8>,
    #[serde(default)]
    pub gpio_labels: Vec<GpioLabel>,
    #[serde(default)]
    pub gpio_backend: GpioBackendKind,
}

fn default_true() -> bool {
    true
}

fn default_gpio_poll_interval_ms() -> u64 {
    100
}

fn default_slow_poll_interval_ms() -> u64 {
    2_000
}

fn default_gpio_pins() -> Vec<u8> {
    DEFAULT_GPIO_PINS.to_vec()
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            gpio_enabled: true,
            wifi_enabled: true,
            bluetooth_enabled: true,
            system_health_enabled: true,
            gpio_poll_interval_ms: default_gpio_poll_interval_ms(),
            network_poll_interval_ms: default_slow_poll_interval_ms(),
            system_poll_interval_ms: default_slow_poll_interval_ms(),
            gpio_pins: default_gpio_pins(),
            gpio_labels: Vec::new(),
            gpio_backend: GpioBackendKind::default(),
        }
    }
}

impl SourcesConfig {
    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            gpio: self.gpio_enabled,
            wifi: self.wifi_enabled,
            bluetooth: self.bluetooth_enabled,
            system_health: self.system_health_enabled,
        }
    }

    /// Monitored pins with their labels. Empty when GPIO is disabled.
    ///
    /// A label for a pin outside `gpio_pins` adds that pin.
    pub fn gpio_schema(&self) -> BTreeMap<u8, PinDefinition> {
        if !self.gpio_enabled {
            return BTreeMap::new();
        }
        let mut schema: BTreeMap<u8, PinDefinition> = self
            .gpio_pins
            .iter()
            .map(|&pin| (pin, PinDefinition::input(pin)))
            .collect();
        for label in &self.gpio_labels {
            schema
                .entry(label.pin)
                .or_insert_with(|| PinDefinition::input(label.pin))
                .label = Some(label.label.clone());
        }
        schema
    }

    pub fn gpio_period(&self) -> Duration {
        Duration::from_millis(self.gpio_poll_interval_ms)
    }

    pub fn network_period(&self) -> Duration {
        Duration::from_millis(self.network_poll_interval_ms)
    }

    pub fn system_period(&self) -> Duration {
        Duration::from_millis(self.system_poll_interval_ms)
    }
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// `EnvFilter` directives; `RUST_LOG` takes precedence.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    DEFAULT_FILTER.to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub thresholds: ThresholdConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Where the configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Path given with `--config` or `PIDBG_CONFIG`; must exist.
    Explicit(PathBuf),
    /// `config/default.toml` in the working directory.
    DefaultFile(PathBuf),
    /// Nothing found; built-in defaults.
    Defaults,
}

impl ConfigSource {
    pub fn resolve(explicit: Option<PathBuf>) -> Self {
        match explicit {
            Some(path) => Self::Explicit(path),
            None if Path::new(DEFAULT_CONFIG_PATH).is_file() => {
                Self::DefaultFile(PathBuf::from(DEFAULT_CONFIG_PATH))
            }
            None => Self::Defaults,
        }
    }

    pub fn load(&self) -> AppResult<AppConfig> {
        match self {
            Self::Explicit(path) | Self::DefaultFile(path) => AppConfig::from_file(path),
            Self::Defaults => Ok(AppConfig::default()),
        }
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Explicit(path) | Self::DefaultFile(path) => write!(f, "{}", path.display()),
            Self::Defaults => write!(f, "built-in defaults"),
        }
    }
}

impl AppConfig {
    /// Load from a file: JSON when the extension is `.json`, TOML otherwise.
    pub fn from_file(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config {}: {e}", path.display()))
        })?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_toml_str(&content)
        }
    }

    pub fn from_toml_str(content: &str) -> AppResult<Self> {
        toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    pub fn from_json_str(content: &str) -> AppResult<Self> {
        serde_json::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    pub fn validate(&self) -> AppResult<()> {
        let intervals = [
            ("gpio_poll_interval_ms", self.sources.gpio_poll_interval_ms),
            ("network_poll_interval_ms", self.sources.network_poll_interval_ms),
            ("system_poll_interval_ms", self.sources.system_poll_interval_ms),
        ];
        if let Some((name, _)) = intervals.iter().find(|(_, ms)| *ms == 0) {
            return Err(AppError::Config(format!("{name} must be greater than zero")));
        }
        if self.sources.gpio_enabled && self.sources.gpio_schema().is_empty() {
            return Err(AppError::Config(
                "gpio is enabled but no pins are configured".to_string(),
            ));
        }
        self.engine.validate()?;
        Ok(())
    }

    /// Engine config with the thresholds, capabilities and pin schema filled in.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            thresholds: self.thresholds.clone(),
            capabilities: self.sources.capabilities(),
            gpio_schema: self.sources.gpio_schema(),
            ..self.engine.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(config.sources.gpio_enabled);
        assert_eq!(config.sources.gpio_poll_interval_ms, 100);
        assert_eq!(config.sources.network_poll_interval_ms, 2_000);
        assert_eq!(config.sources.gpio_schema().len(), DEFAULT_GPIO_PINS.len());
        assert_eq!(config.dashboard.port, 8000);
        assert_eq!(config.engine.subscriber_buffer, 256);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config = AppConfig::from_toml_str(
            r#"
            [sources]
            wifi_enabled = false
            gpio_pins = [17]
            gpio_labels = [{ pin = 17, label = "Door" }, { pin = 5, label = "Fan" }]
            gpio_backend = "mock"

            [thresholds]
            cpu_temp_max_c = 70.0

            [dashboard]
            port = 9000
            "#,
        )
        .unwrap();

        assert!(!config.sources.wifi_enabled);
        assert!(config.sources.bluetooth_enabled);
        assert_eq!(config.sources.gpio_backend, GpioBackendKind::Mock);
        assert_eq!(config.thresholds.cpu_temp_max_c, 70.0);
        assert_eq!(config.thresholds.disk_used_max_pct, 90.0);
        assert_eq!(config.dashboard.port, 9000);
        assert_eq!(config.dashboard.host, "0.0.0.0");

        let schema = config.sources.gpio_schema();
        assert_eq!(schema.keys().copied().collect::<Vec<_>>(), vec![5, 17]);
        assert_eq!(schema[&17].label.as_deref(), Some("Door"));
        assert_eq!(schema[&5].label.as_deref(), Some("Fan"));
    }

    #[test]
    fn test_json_settings() {
        let config = AppConfig::from_json_str(
            r#"{"sources": {"gpio_enabled": false, "system_poll_interval_ms": 5000}}"#,
        )
        .unwrap();
        assert!(!config.sources.gpio_enabled);
        assert!(config.sources.gpio_schema().is_empty());
        assert_eq!(config.sources.system_period(), Duration::from_secs(5));
        assert!(!config.engine_config().capabilities.gpio);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = AppConfig::default();
        config.sources.network_poll_interval_ms = 0;
        assert!(matches!(config.validate(), Err(AppError::Config(_))));

        let mut config = AppConfig::default();
        config.sources.gpio_pins.clear();
        assert!(config.validate().is_err());
        config.sources.gpio_enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_engine_config_carries_schema() {
        let mut config = AppConfig::default();
        config.sources.gpio_pins = vec![4];
        config.sources.bluetooth_enabled = false;
        config.engine.intake_capacity = 16;

        let engine = config.engine_config();
        assert_eq!(engine.intake_capacity, 16);
        assert!(!engine.capabilities.bluetooth);
        assert!(engine.gpio_schema.contains_key(&4));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let source = ConfigSource::resolve(Some(PathBuf::from("/nonexistent/pidbg.toml")));
        assert!(matches!(source, ConfigSource::Explicit(_)));
        assert!(source.load().is_err());
    }
}
