//! Command line interface.

use crate::config::AppConfig;
use clap::Parser;
use pidbg_sources::GpioBackendKind;
use std::path::PathBuf;

/// Raspberry Pi device-state debugger
#[derive(Parser, Debug)]
#[command(name = "pidbg", version, about, long_about = None)]
pub struct Cli {
    /// Address to bind the dashboard to
    #[arg(long)]
    pub host: Option<String>,

    /// Dashboard port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Configuration file (TOML, or JSON with a .json extension)
    #[arg(short, long, env = "PIDBG_CONFIG")]
    pub config: Option<PathBuf>,

    /// Disable GPIO monitoring
    #[arg(long)]
    pub no_gpio: bool,

    /// Disable WiFi monitoring
    #[arg(long)]
    pub no_wifi: bool,

    /// Disable Bluetooth monitoring
    #[arg(long)]
    pub no_bluetooth: bool,

    /// Disable system health monitoring
    #[arg(long)]
    pub no_system: bool,

    /// GPIO backend: auto, mock or rppal
    #[arg(long)]
    pub gpio_backend: Option<GpioBackendKind>,

    /// GPIO polling interval in milliseconds
    #[arg(long)]
    pub gpio_interval_ms: Option<u64>,
}

impl Cli {
    /// Apply command line overrides on top of file values.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(host) = &self.host {
            config.dashboard.host = host.clone();
        }
        if let Some(port) = self.port {
            config.dashboard.port = port;
        }
        if self.no_gpio {
            config.sources.gpio_enabled = false;
        }
        if self.no_wifi {
            config.sources.wifi_enabled = false;
        }
        if self.no_bluetooth {
            config.sources.bluetooth_enabled = false;
        }
        if self.no_system {
            config.sources.system_health_enabled = false;
        }
        if let Some(kind) = self.gpio_backend {
            config.sources.gpio_backend = kind;
        }
        if let Some(ms) = self.gpio_interval_ms {
            config.sources.gpio_poll_interval_ms = ms;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_applied() {
        let cli = Cli::try_parse_from([
            "pidbg",
            "--host",
            "127.0.0.1",
            "--port",
            "9001",
            "--no-wifi",
            "--no-system",
            "--gpio-backend",
            "mock",
            "--gpio-interval-ms",
            "250",
        ])
        .unwrap();

        let mut config = AppConfig::default();
        cli.apply(&mut config);
        assert_eq!(config.dashboard.host, "127.0.0.1");
        assert_eq!(config.dashboard.port, 9001);
        assert!(!config.sources.wifi_enabled);
        assert!(!config.sources.system_health_enabled);
        assert!(config.sources.gpio_enabled);
        assert!(config.sources.bluetooth_enabled);
        assert_eq!(config.sources.gpio_backend, GpioBackendKind::Mock);
        assert_eq!(config.sources.gpio_poll_interval_ms, 250);
    }

    #[test]
    fn test_no_flags_keeps_file_values() {
        let cli = Cli::try_parse_from(["pidbg"]).unwrap();
        let mut config = AppConfig::default();
        config.dashboard.port = 1234;
        config.sources.wifi_enabled = false;
        cli.apply(&mut config);
        assert_eq!(config.dashboard.port, 1234);
        assert!(!config.sources.wifi_enabled);
    }

    #[test]
    fn test_unknown_backend_rejected() {
        assert!(Cli::try_parse_from(["pidbg", "--gpio-backend", "gpiozero"]).is_err());
    }
}
