//! Hostwatch - Host Telemetry Service
//!
//! This crate serves memory, disk, CPU and host information over HTTP. Every
//! route sits behind a per-client weighted sliding-window rate limiter that
//! blends the previous and current fixed windows to approximate a true
//! sliding window in constant space per client.

pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;
pub mod telemetry;
