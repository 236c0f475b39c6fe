//! Network sampling: wifi, bluetooth and per-interface counters.
//!
//! Wifi and bluetooth state come from the usual Raspberry Pi tools
//! (`iwconfig`, `hostname -I`, `bluetoothctl`). A missing or failing tool
//! yields empty output, which parses as disconnected/unpowered.

use crate::error::SourceResult;
use crate::runner::Sampler;
use parking_lot::Mutex;
use pidbg_core::{BluetoothStatus, InterfaceSet, InterfaceStats, Reading, WifiStatus};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use sysinfo::Networks;
use tokio::process::Command;
use tracing::trace;

const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);
const IFF_UP: u32 = 0x1;

/// Extract ESSID and signal level from `iwconfig` output.
pub fn parse_iwconfig(output: &str) -> (Option<String>, Option<i32>) {
    let mut ssid = None;
    let mut signal = None;
    for line in output.lines() {
        if let Some((_, rest)) = line.split_once("ESSID:") {
            let value = rest.trim().trim_matches('"');
            if !value.is_empty() {
                ssid = Some(value.to_string());
            }
        }
        if line.contains("Signal level") {
            signal = line
                .split_whitespace()
                .find_map(|chunk| chunk.strip_prefix("level="))
                .and_then(|v| v.parse::<i32>().ok());
        }
    }
    (ssid, signal)
}

/// First address printed by `hostname -I`.
pub fn parse_first_ip(output: &str) -> Option<String> {
    output.split_whitespace().next().map(str::to_string)
}

pub fn wifi_from_outputs(iwconfig: &str, hostname: &str) -> WifiStatus {
    let (ssid, signal_level_dbm) = parse_iwconfig(iwconfig);
    let connected = ssid.as_deref().is_some_and(|s| s != "off/any");
    WifiStatus {
        connected,
        ssid,
        ip_address: parse_first_ip(hostname),
        signal_level_dbm,
        timestamp: chrono::Utc::now(),
    }
}

/// Build bluetooth status from `bluetoothctl show` and `bluetoothctl info`.
pub fn bluetooth_from_outputs(show: &str, info: &str) -> BluetoothStatus {
    BluetoothStatus::new(show.contains("Powered: yes"), info.contains("Connected: yes"))
}

/// Parse `/sys/class/net/<if>/flags` (hex) into the administrative up state.
pub fn parse_if_flags(contents: &str) -> Option<bool> {
    let hex = contents.trim().trim_start_matches("0x");
    u32::from_str_radix(hex, 16)
        .ok()
        .map(|flags| flags & IFF_UP != 0)
}

fn interface_is_up(name: &str) -> bool {
    let base = Path::new("/sys/class/net").join(name);
    if let Some(up) = std::fs::read_to_string(base.join("flags"))
        .ok()
        .and_then(|s| parse_if_flags(&s))
    {
        return up;
    }
    std::fs::read_to_string(base.join("operstate"))
        .map(|s| s.trim() == "up")
        .unwrap_or(false)
}

/// Run a command and return its trimmed stdout, or an empty string.
async fn run_command(program: &str, args: &[&str]) -> String {
    let output = Command::new(program)
        .args(args)
        .stdin(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .kill_on_drop(true)
        .output();
    match tokio::time::timeout(COMMAND_TIMEOUT, output).await {
        Ok(Ok(out)) if out.status.success() => String::from_utf8_lossy(&out.stdout).trim().to_string(),
        Ok(Ok(out)) => {
            trace!(program, status = ?out.status, "Command exited with failure");
            String::new()
        }
        Ok(Err(e)) => {
            trace!(program, error = %e, "Command unavailable");
            String::new()
        }
        Err(_) => {
            trace!(program, "Command timed out");
            String::new()
        }
    }
}

pub struct NetworkSampler {
    wifi: bool,
    bluetooth: bool,
    interfaces: bool,
    networks: Arc<Mutex<Networks>>,
}

impl NetworkSampler {
    pub fn new(wifi: bool, bluetooth: bool) -> Self {
        Self {
            wifi,
            bluetooth,
            interfaces: true,
            networks: Arc::new(Mutex::new(Networks::new_with_refreshed_list())),
        }
    }

    pub fn without_interfaces(mut self) -> Self {
        self.interfaces = false;
        self
    }

    async fn wifi_status(&self) -> WifiStatus {
        let iwconfig = run_command("iwconfig", &[]).await;
        let hostname = run_command("hostname", &["-I"]).await;
        wifi_from_outputs(&iwconfig, &hostname)
    }

    async fn bluetooth_status(&self) -> BluetoothStatus {
        let show = run_command("bluetoothctl", &["show"]).await;
        let info = run_command("bluetoothctl", &["info"]).await;
        bluetooth_from_outputs(&show, &info)
    }

    async fn interface_stats(&self) -> SourceResult<Vec<InterfaceStats>> {
        let networks = self.networks.clone();
        let stats = tokio::task::spawn_blocking(move || {
            let mut networks = networks.lock();
            networks.refresh_list();
            let mut stats: Vec<InterfaceStats> = networks
                .iter()
                .map(|(name, data)| InterfaceStats {
                    name: name.clone(),
                    is_up: interface_is_up(name),
                    rx_bytes: data.total_received(),
                    tx_bytes: data.total_transmitted(),
                    rx_errs: data.total_errors_on_received(),
                    tx_errs: data.total_errors_on_transmitted(),
                })
                .collect();
            stats.sort_by(|a, b| a.name.cmp(&b.name));
            stats
        })
        .await?;
        Ok(stats)
    }
}

impl Sampler for NetworkSampler {
    fn name(&self) -> &'static str {
        "network"
    }

    async fn sample(&mut self) -> SourceResult<Vec<Reading>> {
        let mut readings = Vec::with_capacity(3);
        if self.wifi {
            readings.push(Reading::Wifi(self.wifi_status().await));
        }
        if self.bluetooth {
            readings.push(Reading::Bluetooth(self.bluetooth_status().await));
        }
        if self.interfaces {
            let stats = self.interface_stats().await?;
            readings.push(Reading::InterfaceSet(InterfaceSet::new(stats)));
        }
        Ok(readings)
    }
}
