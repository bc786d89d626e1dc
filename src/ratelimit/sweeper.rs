//! Background eviction of idle clients.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::limiter::SlidingWindowLimiter;

/// Shortest interval between sweeps.
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

/// Periodically removes clients that have been idle for two windows.
///
/// Evicted clients behave exactly like new ones on their next request, so
/// sweeping only bounds memory use.
pub struct IdleSweeper {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl IdleSweeper {
    /// Start sweeping `limiter` every `interval`.
    ///
    /// Intervals below [`MIN_SWEEP_INTERVAL`] (including zero) are raised to it.
    pub fn spawn(limiter: Arc<SlidingWindowLimiter>, interval: Duration) -> Self {
        let interval = interval.max(MIN_SWEEP_INTERVAL);
        let (stop, mut stopped) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = limiter.evict_idle();
                        if removed > 0 {
                            debug!(
                                removed = removed,
                                tracked = limiter.store().len(),
                                "Evicted idle clients"
                            );
                        }
                    }
                    _ = stopped.changed() => break,
                }
            }
        });

        info!(interval_ms = interval.as_millis() as u64, "Idle client sweeper started");
        Self { stop, handle }
    }

    /// Stop sweeping and wait for the task to finish.
    pub async fn shutdown(self) {
        let _ = self.stop.send(true);
        if let Err(e) = self.handle.await {
            warn!(error = %e, "Idle client sweeper ended abnormally");
        }
        info!("Idle client sweeper stopped");
    }
}
