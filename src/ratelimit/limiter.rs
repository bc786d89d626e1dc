//! Core rate limiter implementation.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use super::backend::RateLimiterBackend;
use super::clock::{Clock, SystemClock};
use super::key::ClientKey;
use super::store::WindowStore;

/// Default maximum requests per window.
pub const DEFAULT_MAX_REQUESTS: u64 = 20;
/// Default window length.
pub const DEFAULT_WINDOW_LENGTH: Duration = Duration::from_secs(30);

/// Configuration for a rate limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitConfig {
    /// Maximum requests allowed per trailing window
    pub max_requests: u64,
    /// Length of one fixed window
    pub window_length: Duration,
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            max_requests: DEFAULT_MAX_REQUESTS,
            window_length: DEFAULT_WINDOW_LENGTH,
        }
    }
}

/// Outcome of evaluating one request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    /// The request may proceed.
    Admit {
        /// Configured maximum requests per window
        limit: u64,
        /// Further requests the client could make right now
        remaining: u64,
        /// Time until the client's current window rotates
        reset_after: Duration,
    },
    /// The request must be refused.
    Reject {
        /// Configured maximum requests per window
        limit: u64,
        /// Time until the client's current window rotates
        retry_after: Duration,
    },
}

impl Decision {
    /// Whether the request was admitted.
    pub fn is_admitted(&self) -> bool {
        matches!(self, Decision::Admit { .. })
    }

    /// Configured maximum requests per window.
    pub fn limit(&self) -> u64 {
        match *self {
            Decision::Admit { limit, .. } | Decision::Reject { limit, .. } => limit,
        }
    }
}

/// Point-in-time counters describing limiter activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LimiterStats {
    /// Clients currently held in the window store
    pub tracked_clients: usize,
    /// Requests admitted since start
    pub admitted_total: u64,
    /// Requests rejected since start
    pub rejected_total: u64,
    /// Configured maximum requests per window
    pub max_requests: u64,
    /// Configured window length in seconds
    pub window_secs: u64,
}

/// Weighted sliding-window rate limiter.
///
/// Each client's rate is estimated from two adjacent fixed windows: the
/// previous window's count, weighted by how much of it still overlaps the
/// trailing window, plus the current window's count. A request is rejected
/// when that estimate has already reached the limit. Rejected requests are
/// not counted.
///
/// This struct is thread-safe and can be shared across multiple tasks.
pub struct SlidingWindowLimiter {
    /// Per-client window state
    store: WindowStore,
    /// Limit applied to every client
    config: LimitConfig,
    /// Time source for [`check`](Self::check)
    clock: Arc<dyn Clock>,
    /// Requests admitted since start
    admitted: AtomicU64,
    /// Requests rejected since start
    rejected: AtomicU64,
}

impl SlidingWindowLimiter {
    /// Create a limiter reading time from the system clock.
    pub fn new(config: LimitConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a limiter reading time from `clock`.
    pub fn with_clock(config: LimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            store: WindowStore::new(),
            config,
            clock,
            admitted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    /// Evaluate a request from `key` arriving at `now`.
    ///
    /// The whole evaluation runs while holding the key's store guard, so
    /// concurrent requests from one client behave as if serialized.
    pub fn evaluate(&self, key: &ClientKey, now: Instant) -> Decision {
        let limit = self.config.max_requests;
        let window_length = self.config.window_length;

        let mut state = self.store.get_or_create(key, now);
        state.touch(now);
        WindowStore::rotate_if_expired(&mut state, now, window_length);

        let estimated = state.estimated_rate(now, window_length);
        let reset_after = state.duration_until_reset(now, window_length);

        trace!(
            key = %key,
            previous = state.previous_count(),
            current = state.current_count(),
            estimated = estimated,
            "Checking rate limit"
        );

        if estimated >= limit as f64 {
            drop(state);
            self.rejected.fetch_add(1, Ordering::Relaxed);
            debug!(
                key = %key,
                estimated = estimated,
                limit = limit,
                retry_after_ms = reset_after.as_millis() as u64,
                "Rate limit exceeded"
            );
            return Decision::Reject {
                limit,
                retry_after: reset_after,
            };
        }

        WindowStore::increment(&mut state);
        drop(state);
        self.admitted.fetch_add(1, Ordering::Relaxed);

        let remaining = (limit as f64 - (estimated + 1.0)).max(0.0).ceil() as u64;
        Decision::Admit {
            limit,
            remaining,
            reset_after,
        }
    }

    /// Evaluate a request from `key` at the limiter clock's current time.
    pub fn check(&self, key: &ClientKey) -> Decision {
        self.evaluate(key, self.clock.now())
    }

    /// Remove clients idle for at least two window lengths.
    ///
    /// Such clients would start from zero on their next request anyway, so
    /// eviction never changes a decision.
    pub fn evict_idle(&self) -> usize {
        let idle_after = self.config.window_length.saturating_mul(2);
        self.store.evict_idle(self.clock.now(), idle_after)
    }

    /// The limit applied to every client.
    pub fn config(&self) -> LimitConfig {
        self.config
    }

    /// The underlying window store.
    pub fn store(&self) -> &WindowStore {
        &self.store
    }

    /// Current activity counters.
    pub fn stats(&self) -> LimiterStats {
        LimiterStats {
            tracked_clients: self.store.len(),
            admitted_total: self.admitted.load(Ordering::Relaxed),
            rejected_total: self.rejected.load(Ordering::Relaxed),
            max_requests: self.config.max_requests,
            window_secs: self.config.window_length.as_secs(),
        }
    }
}

impl Default for SlidingWindowLimiter {
    fn default() -> Self {
        Self::new(LimitConfig::default())
    }
}

impl RateLimiterBackend for SlidingWindowLimiter {
    fn check(&self, key: &ClientKey) -> Decision {
        SlidingWindowLimiter::check(self, key)
    }

    fn stats(&self) -> LimiterStats {
        SlidingWindowLimiter::stats(self)
    }
}
