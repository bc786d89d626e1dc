//! Serializable telemetry payloads.

use serde::Serialize;

/// Physical memory and swap usage.
#[derive(Debug, Clone, Serialize)]
pub struct MemoryReport {
    /// Share of physical memory in use, one decimal place
    pub used_percent: f64,
    /// Physical memory in use, in MB
    pub ram_usage_mb: u64,
    /// Installed physical memory, in MB
    pub total_mb: u64,
    /// Memory not used for anything, in MB
    pub free_mb: u64,
    /// Memory that can be handed to new allocations, in MB
    pub available_mb: u64,
    /// Swap in use, in MB
    pub swap_used_mb: u64,
    /// Configured swap, in MB
    pub swap_total_mb: u64,
}

/// Usage of one mounted filesystem.
#[derive(Debug, Clone, Serialize)]
pub struct DiskEntry {
    /// Device or volume name
    pub device: String,
    /// Where the filesystem is mounted
    pub mountpoint: String,
    /// Filesystem type, e.g. `ext4`
    pub fs_type: String,
    /// Storage medium (`SSD`, `HDD` or unknown)
    pub kind: String,
    /// Whether the device is removable
    pub removable: bool,
    /// Share of capacity in use, one decimal place
    pub used_percent: f64,
    /// Capacity in GiB
    pub total_gb: u64,
    /// Space in use in GiB
    pub used_gb: u64,
    /// Space available in GiB
    pub available_gb: u64,
}

/// All mounted filesystems.
#[derive(Debug, Clone, Serialize)]
pub struct DiskReport {
    pub disks: Vec<DiskEntry>,
}

/// Global CPU utilisation.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CpuUsage {
    /// Utilisation rounded to one decimal place
    pub usage_percentage: f64,
    /// Utilisation as reported by the OS
    pub detailed_usage_percentage: f64,
}

/// Static CPU description.
#[derive(Debug, Clone, Serialize)]
pub struct CpuInfo {
    /// Logical CPU count
    pub cores: usize,
    /// Brand string of the first CPU
    pub model: String,
    /// Current frequency of the first CPU
    pub mhz: u64,
    /// Vendor identifier, e.g. `GenuineIntel`
    pub vendor: String,
}

/// Host and operating system description.
#[derive(Debug, Clone, Serialize)]
pub struct SystemReport {
    pub hostname: String,
    /// Operating system family (`linux`, `macos`, ...)
    pub os: String,
    /// Distribution or product name
    pub platform: String,
    pub kernel: String,
    pub os_version: String,
    /// Host uptime rendered as `1d2h3m4s`
    pub uptime: String,
    pub uptime_secs: u64,
    /// Boot time in RFC 3339
    pub boot_time: String,
    /// Number of running processes
    pub procs: usize,
    pub host_arch: String,
    /// Version of this service
    pub service_version: String,
}

/// Load averages over one, five and fifteen minutes.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct LoadReport {
    pub one: f64,
    pub five: f64,
    pub fifteen: f64,
}

/// Resource usage of the running service process.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ProcessReport {
    pub pid: u32,
    /// CPU usage since the previous refresh, one decimal place
    pub cpu_percent: f64,
    /// Resident memory in bytes
    pub memory_bytes: u64,
    pub virtual_memory_bytes: u64,
    pub threads: usize,
    /// Seconds since the probe was created
    pub uptime_secs: u64,
}
