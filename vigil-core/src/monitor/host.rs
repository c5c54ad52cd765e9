use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use sysinfo::{
    CpuRefreshKind, Disks, MemoryRefreshKind, Pid, ProcessRefreshKind, ProcessesToUpdate,
    RefreshKind, System,
};
use tracing::trace;

use crate::error::{VigilError, VigilResult};

/// One reading of host telemetry.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HostSample {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub memory_used_mb: f64,
    pub disk_usage_percent: f64,
    pub active_threads: usize,
}

/// Source of host metrics for the sampling loop and the memory-aware wrappers.
pub trait HostMetricsSource: Send + Sync {
    fn sample(&self) -> VigilResult<HostSample>;

    /// Resident memory of the current process in bytes, if the platform reports it.
    fn process_memory_bytes(&self) -> Option<u64>;
}

/// Host source for environments without telemetry; always reports zeros.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullHostSource;

impl HostMetricsSource for NullHostSource {
    fn sample(&self) -> VigilResult<HostSample> {
        Ok(HostSample::default())
    }

    fn process_memory_bytes(&self) -> Option<u64> {
        None
    }
}

pub struct SysinfoHostSource {
    system: Mutex<System>,
    pid: Option<Pid>,
    disk_path: PathBuf,
}

impl SysinfoHostSource {
    pub fn new() -> Self {
        let system = System::new_with_specifics(
            RefreshKind::nothing()
                .with_cpu(CpuRefreshKind::everything())
                .with_memory(MemoryRefreshKind::everything()),
        );

        Self {
            system: Mutex::new(system),
            pid: sysinfo::get_current_pid().ok(),
            disk_path: std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/")),
        }
    }

    /// Report disk usage for the filesystem holding `path` instead of the working directory.
    pub fn with_disk_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.disk_path = path.into();
        self
    }

    fn refresh_process(&self, system: &mut System) -> Option<Pid> {
        let pid = self.pid?;
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing().with_memory(),
        );
        Some(pid)
    }

    fn disk_usage_percent(&self) -> f64 {
        let disks = Disks::new_with_refreshed_list();
        let disk = disks
            .list()
            .iter()
            .filter(|d| self.disk_path.starts_with(d.mount_point()))
            .max_by_key(|d| d.mount_point().as_os_str().len())
            .or_else(|| {
                disks
                    .list()
                    .iter()
                    .find(|d| d.mount_point() == Path::new("/"))
            });

        match disk {
            Some(d) if d.total_space() > 0 => {
                let used = d.total_space().saturating_sub(d.available_space());
                used as f64 / d.total_space() as f64 * 100.0
            }
            _ => 0.0,
        }
    }
}

impl Default for SysinfoHostSource {
    fn default() -> Self {
        Self::new()
    }
}

impl HostMetricsSource for SysinfoHostSource {
    fn sample(&self) -> VigilResult<HostSample> {
        let mut system = self.system.lock();

        system.refresh_cpu_all();
        system.refresh_memory();

        let total = system.total_memory();
        if total == 0 {
            return Err(VigilError::MetricsCollectionFailed(
                "host reported no memory".to_string(),
            ));
        }

        let used = system.used_memory();
        let cpu_percent = f64::from(system.global_cpu_usage());
        let active_threads = self
            .refresh_process(&mut system)
            .and_then(|pid| system.process(pid))
            .map(|p| p.tasks().map(|t| t.len()).unwrap_or(1))
            .unwrap_or(1);
        drop(system);

        let sample = HostSample {
            cpu_percent,
            memory_percent: used as f64 / total as f64 * 100.0,
            memory_used_mb: used as f64 / 1024.0 / 1024.0,
            disk_usage_percent: self.disk_usage_percent(),
            active_threads,
        };

        trace!(
            cpu_percent = sample.cpu_percent,
            memory_percent = sample.memory_percent,
            disk_usage_percent = sample.disk_usage_percent,
            active_threads = sample.active_threads,
            "Host metrics collected"
        );

        Ok(sample)
    }

    fn process_memory_bytes(&self) -> Option<u64> {
        let mut system = self.system.lock();
        let pid = self.refresh_process(&mut system)?;
        system.process(pid).map(|p| p.memory())
    }
}
