//! Host telemetry collection backed by `sysinfo`.
//!
//! Every method here performs blocking reads of OS state. Call them from
//! `tokio::task::spawn_blocking` when running on an async worker.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::time::{Duration, Instant};
use sysinfo::{CpuRefreshKind, Disks, Pid, System};

use super::report::{
    CpuInfo, CpuUsage, DiskEntry, DiskReport, LoadReport, MemoryReport, ProcessReport,
    SystemReport,
};
use super::round_to;
use crate::error::{HostwatchError, Result};

const BYTES_PER_MB: u64 = 1000 * 1000;
const BYTES_PER_GIB: u64 = 1024 * 1024 * 1024;

/// Reads memory, disk, CPU and host information.
///
/// A single `System` is kept between calls because CPU utilisation is
/// computed from the difference between two consecutive refreshes.
pub struct HostProbe {
    system: Mutex<System>,
    started_at: Instant,
}

impl HostProbe {
    /// Create a probe and take the initial CPU sample.
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_specifics(CpuRefreshKind::everything());
        Self {
            system: Mutex::new(system),
            started_at: Instant::now(),
        }
    }

    /// Physical memory and swap usage.
    pub fn memory(&self) -> MemoryReport {
        let mut sys = self.system.lock();
        sys.refresh_memory();

        let total = sys.total_memory();
        let used = sys.used_memory();
        let used_percent = if total == 0 {
            0.0
        } else {
            used as f64 / total as f64 * 100.0
        };

        MemoryReport {
            used_percent: round_to(used_percent, 1),
            ram_usage_mb: used / BYTES_PER_MB,
            total_mb: total / BYTES_PER_MB,
            free_mb: sys.free_memory() / BYTES_PER_MB,
            available_mb: sys.available_memory() / BYTES_PER_MB,
            swap_used_mb: sys.used_swap() / BYTES_PER_MB,
            swap_total_mb: sys.total_swap() / BYTES_PER_MB,
        }
    }

    /// Usage of every mounted filesystem.
    pub fn disks(&self) -> DiskReport {
        let disks = Disks::new_with_refreshed_list();
        let disks = disks
            .list()
            .iter()
            .map(|disk| {
                let total = disk.total_space();
                let available = disk.available_space();
                let used = total.saturating_sub(available);
                let used_percent = if total == 0 {
                    0.0
                } else {
                    used as f64 / total as f64 * 100.0
                };

                DiskEntry {
                    device: disk.name().to_string_lossy().into_owned(),
                    mountpoint: disk.mount_point().display().to_string(),
                    fs_type: disk.file_system().to_string_lossy().into_owned(),
                    kind: format!("{:?}", disk.kind()),
                    removable: disk.is_removable(),
                    used_percent: round_to(used_percent, 1),
                    total_gb: total / BYTES_PER_GIB,
                    used_gb: used / BYTES_PER_GIB,
                    available_gb: available / BYTES_PER_GIB,
                }
            })
            .collect();

        DiskReport { disks }
    }

    /// Global CPU utilisation since the previous sample.
    pub fn cpu_usage(&self) -> CpuUsage {
        let mut sys = self.system.lock();
        sys.refresh_cpu_usage();
        let cpus = sys.cpus();
        let usage = if cpus.is_empty() {
            0.0
        } else {
            cpus.iter().map(|cpu| f64::from(cpu.cpu_usage())).sum::<f64>() / cpus.len() as f64
        };

        CpuUsage {
            usage_percentage: round_to(usage, 1),
            detailed_usage_percentage: usage,
        }
    }

    /// Model, vendor and clock speed of the first CPU.
    pub fn cpu_info(&self) -> Result<CpuInfo> {
        let mut sys = self.system.lock();
        sys.refresh_cpu_specifics(CpuRefreshKind::new().with_frequency());

        let cpus = sys.cpus();
        let first = cpus
            .first()
            .ok_or_else(|| HostwatchError::Telemetry("no CPUs reported by the OS".to_string()))?;

        Ok(CpuInfo {
            cores: cpus.len(),
            model: first.brand().trim().to_string(),
            mhz: first.frequency(),
            vendor: first.vendor_id().to_string(),
        })
    }

    /// Host and operating system description.
    pub fn system(&self) -> SystemReport {
        let procs = {
            let mut sys = self.system.lock();
            sys.refresh_all();
            sys.processes().len()
        };

        let uptime_secs = System::uptime();
        let boot_time = DateTime::<Utc>::from_timestamp(System::boot_time() as i64, 0)
            .map(|t| t.to_rfc3339())
            .unwrap_or_default();

        SystemReport {
            hostname: System::host_name().unwrap_or_default(),
            os: std::env::consts::OS.to_string(),
            platform: System::name().unwrap_or_default(),
            kernel: System::kernel_version().unwrap_or_default(),
            os_version: System::os_version().unwrap_or_default(),
            uptime: format_uptime(Duration::from_secs(uptime_secs)),
            uptime_secs,
            boot_time,
            procs,
            host_arch: std::env::consts::ARCH.to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Load averages.
    pub fn load(&self) -> LoadReport {
        let load = System::load_average();
        LoadReport {
            one: round_to(load.one, 2),
            five: round_to(load.five, 2),
            fifteen: round_to(load.fifteen, 2),
        }
    }

    /// Resource usage of this process.
    pub fn process(&self) -> ProcessReport {
        let pid = Pid::from_u32(std::process::id());
        let uptime_secs = self.started_at.elapsed().as_secs();

        let mut sys = self.system.lock();
        sys.refresh_all();

        sys.process(pid)
            .map(|p| ProcessReport {
                pid: pid.as_u32(),
                cpu_percent: round_to(f64::from(p.cpu_usage()), 1),
                memory_bytes: p.memory(),
                virtual_memory_bytes: p.virtual_memory(),
                threads: p.tasks().map(|tasks| tasks.len()).unwrap_or(1),
                uptime_secs,
            })
            .unwrap_or(ProcessReport {
                pid: pid.as_u32(),
                uptime_secs,
                ..ProcessReport::default()
            })
    }
}

impl Default for HostProbe {
    fn default() -> Self {
        Self::new()
    }
}

/// Render an uptime as `1d2h3m4s`, omitting leading zero units.
fn format_uptime(uptime: Duration) -> String {
    let total = uptime.as_secs();
    let (days, rem) = (total / 86_400, total % 86_400);
    let (hours, rem) = (rem / 3_600, rem % 3_600);
    let (minutes, seconds) = (rem / 60, rem % 60);

    let mut out = String::new();
    if days > 0 {
        out.push_str(&format!("{}d", days));
    }
    if days > 0 || hours > 0 {
        out.push_str(&format!("{}h", hours));
    }
    if days > 0 || hours > 0 || minutes > 0 {
        out.push_str(&format!("{}m", minutes));
    }
    out.push_str(&format!("{}s", seconds));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(Duration::from_secs(42)), "42s");
        assert_eq!(format_uptime(Duration::from_secs(3_605)), "1h0m5s");
        assert_eq!(format_uptime(Duration::from_secs(90_061)), "1d1h1m1s");
    }

    #[test]
    fn test_memory_report_is_consistent() {
        let probe = HostProbe::new();
        let report = probe.memory();
        assert!(report.used_percent >= 0.0 && report.used_percent <= 100.0);
        assert!(report.ram_usage_mb <= report.total_mb);
    }

    #[test]
    fn test_cpu_usage_in_range() {
        let probe = HostProbe::new();
        let usage = probe.cpu_usage();
        assert!(usage.detailed_usage_percentage >= 0.0);
        assert!(usage.usage_percentage <= 100.0);
    }

    #[test]
    fn test_process_report_names_this_process() {
        let probe = HostProbe::new();
        assert_eq!(probe.process().pid, std::process::id());
    }

    #[test]
    fn test_system_report_arch() {
        let probe = HostProbe::new();
        let report = probe.system();
        assert_eq!(report.host_arch, std::env::consts::ARCH);
        assert_eq!(report.service_version, env!("CARGO_PKG_VERSION"));
    }
}
