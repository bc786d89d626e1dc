//! Rate limiter trait for abstracting limiter implementations.

use super::key::ClientKey;
use super::limiter::{Decision, LimiterStats};

/// Trait for rate limiter implementations.
///
/// The HTTP middleware depends only on this trait, so the sliding window
/// limiter can be swapped for another policy without touching request
/// handling.
pub trait RateLimiterBackend: Send + Sync {
    /// Evaluate one request from `key` at the backend's current time.
    fn check(&self, key: &ClientKey) -> Decision;

    /// Current activity counters.
    fn stats(&self) -> LimiterStats;
}
