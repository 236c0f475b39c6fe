//! Host resource sampling through sysinfo.

use crate::error::SourceResult;
use crate::runner::Sampler;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use pidbg_core::{ProcessInfo, Reading, SystemHealth};
use std::path::Path;
use std::sync::Arc;
use sysinfo::{Components, Disks, System};

const TOP_PROCESSES: usize = 3;

/// Percentage of `used` over `total`; `None` when `total` is zero.
pub fn percent(used: u64, total: u64) -> Option<f64> {
    (total > 0).then(|| used as f64 / total as f64 * 100.0)
}

/// Busiest processes by cpu, highest first. Unknown usage sorts last.
pub fn top_processes(mut procs: Vec<ProcessInfo>, limit: usize) -> Vec<ProcessInfo> {
    procs.sort_by(|a, b| {
        let a = a.cpu_percent.unwrap_or(0.0);
        let b = b.cpu_percent.unwrap_or(0.0);
        b.total_cmp(&a)
    });
    procs.truncate(limit);
    procs
}

fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

struct HostHandles {
    system: System,
    disks: Disks,
    components: Components,
}

impl HostHandles {
    fn collect(&mut self) -> SystemHealth {
        self.system.refresh_cpu();
        self.system.refresh_memory();
        self.system.refresh_processes();
        self.disks.refresh();
        self.components.refresh();

        let cpu_percent = finite(self.system.global_cpu_info().cpu_usage() as f64).unwrap_or(0.0);

        let root = self
            .disks
            .list()
            .iter()
            .find(|d| d.mount_point() == Path::new("/"));
        let disk_used_percent = root
            .and_then(|d| {
                let used = d.total_space().saturating_sub(d.available_space());
                percent(used, d.total_space())
            })
            .unwrap_or(0.0);

        let cpu_temp_c = self
            .components
            .list()
            .iter()
            .map(|c| c.temperature() as f64)
            .find_map(finite);

        let load = System::load_average();
        let boot_time = DateTime::<Utc>::from_timestamp(System::boot_time() as i64, 0);

        let processes = self.system.processes();
        let procs = processes
            .iter()
            .map(|(pid, p)| ProcessInfo {
                pid: pid.as_u32(),
                name: Some(p.name().to_string()),
                cpu_percent: finite(p.cpu_usage() as f64),
            })
            .collect();

        let mut health = SystemHealth::new(cpu_percent, disk_used_percent);
        health.cpu_temp_c = cpu_temp_c;
        health.memory_percent =
            percent(self.system.used_memory(), self.system.total_memory()).and_then(finite);
        health.swap_percent = percent(self.system.used_swap(), self.system.total_swap());
        health.load_1 = finite(load.one);
        health.load_5 = finite(load.five);
        health.load_15 = finite(load.fifteen);
        health.uptime_s = Some(System::uptime());
        health.boot_time = boot_time;
        health.process_count = Some(processes.len());
        health.top_processes = Some(top_processes(procs, TOP_PROCESSES));
        health
    }
}

pub struct SystemSampler {
    host: Arc<Mutex<HostHandles>>,
}

impl SystemSampler {
    pub fn new() -> Self {
        Self {
            host: Arc::new(Mutex::new(HostHandles {
                system: System::new(),
                disks: Disks::new_with_refreshed_list(),
                components: Components::new_with_refreshed_list(),
            })),
        }
    }
}

impl Default for SystemSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for SystemSampler {
    fn name(&self) -> &'static str {
        "system"
    }

    async fn sample(&mut self) -> SourceResult<Vec<Reading>> {
        let host = self.host.clone();
        let health = tokio::task::spawn_blocking(move || host.lock().collect()).await?;
        Ok(vec![Reading::System(health)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proc(pid: u32, cpu: Option<f64>) -> ProcessInfo {
        ProcessInfo {
            pid,
            name: None,
            cpu_percent: cpu,
        }
    }

    #[test]
    fn test_percent() {
        assert_eq!(percent(50, 200), Some(25.0));
        assert_eq!(percent(1, 0), None);
    }

    #[test]
    fn test_top_processes_sorted_and_truncated() {
        let procs = vec![
            proc(1, Some(5.0)),
            proc(2, None),
            proc(3, Some(50.0)),
            proc(4, Some(20.0)),
            proc(5, Some(1.0)),
        ];
        let top: Vec<u32> = top_processes(procs, 3).iter().map(|p| p.pid).collect();
        assert_eq!(top, vec![3, 4, 1]);
    }

    #[tokio::test]
    async fn test_sample_produces_valid_reading() {
        let mut sampler = SystemSampler::new();
        let readings = sampler.sample().await.unwrap();
        assert_eq!(readings.len(), 1);
        assert!(readings[0].validate().is_ok());
        match &readings[0] {
            Reading::System(health) => {
                assert!(health.top_processes.as_ref().is_some_and(|p| p.len() <= 3));
                assert!((0.0..=100.0).contains(&health.disk_used_percent));
                assert!(health.process_count.is_some());
            }
            other => panic!("unexpected reading: {other:?}"),
        }
    }
}
