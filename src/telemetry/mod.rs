//! Host telemetry collected for the HTTP endpoints.

mod host;
mod report;

pub use host::HostProbe;
pub use report::{
    CpuInfo, CpuUsage, DiskEntry, DiskReport, LoadReport, MemoryReport, ProcessReport,
    SystemReport,
};

/// Round `value` to `precision` decimal places, halves away from zero.
pub fn round_to(value: f64, precision: i32) -> f64 {
    let scale = 10f64.powi(precision);
    (value * scale).round() / scale
}
