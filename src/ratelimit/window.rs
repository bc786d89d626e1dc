//! Per-client sliding window state.

use std::time::{Duration, Instant};

/// Request counts for one client across two adjacent fixed windows.
///
/// The current window opens at `window_start` and lasts one window length.
/// `previous_count` is the frozen total of the window before it.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientRateState {
    /// When the current window was opened
    window_start: Instant,
    /// Requests admitted in the current window
    current_count: u64,
    /// Requests admitted in the window immediately before `window_start`
    previous_count: u64,
    /// Most recent evaluation for this client, admitted or not
    last_seen: Instant,
}

impl ClientRateState {
    /// Create zeroed state whose window opens at `now`.
    pub fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            current_count: 0,
            previous_count: 0,
            last_seen: now,
        }
    }

    /// When the current window was opened.
    pub fn window_start(&self) -> Instant {
        self.window_start
    }

    /// Requests admitted in the current window.
    pub fn current_count(&self) -> u64 {
        self.current_count
    }

    /// Requests admitted in the previous window.
    pub fn previous_count(&self) -> u64 {
        self.previous_count
    }

    /// Most recent evaluation for this client.
    pub fn last_seen(&self) -> Instant {
        self.last_seen
    }

    /// Record that the client was seen at `now`.
    pub fn touch(&mut self, now: Instant) {
        if now > self.last_seen {
            self.last_seen = now;
        }
    }

    /// Time since the current window opened.
    ///
    /// Zero when `now` is earlier than the window start.
    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.window_start)
    }

    /// Rotate to a new window if the current one has run its full length.
    ///
    /// The current count becomes the previous count, unless the client has
    /// been idle for two or more window lengths, in which case the stale
    /// previous count is discarded as well. Returns `true` if a rotation
    /// happened.
    pub fn rotate_if_expired(&mut self, now: Instant, window_length: Duration) -> bool {
        let elapsed = self.elapsed(now);
        if elapsed < window_length {
            return false;
        }

        self.previous_count = if elapsed < window_length.saturating_mul(2) {
            self.current_count
        } else {
            0
        };
        self.current_count = 0;
        self.window_start = now;
        true
    }

    /// Count one admitted request in the current window.
    pub fn increment(&mut self) {
        self.current_count = self.current_count.saturating_add(1);
    }

    /// Fraction of the current window that has elapsed, in `[0, 1]`.
    pub fn elapsed_fraction(&self, now: Instant, window_length: Duration) -> f64 {
        if window_length.is_zero() {
            return 1.0;
        }
        let fraction = self.elapsed(now).as_secs_f64() / window_length.as_secs_f64();
        fraction.clamp(0.0, 1.0)
    }

    /// Estimated request rate over the trailing window.
    ///
    /// The previous window's count is weighted by the share of it that still
    /// overlaps a window-length interval ending at `now`.
    pub fn estimated_rate(&self, now: Instant, window_length: Duration) -> f64 {
        let weight = 1.0 - self.elapsed_fraction(now, window_length);
        self.previous_count as f64 * weight + self.current_count as f64
    }

    /// Time left until the current window rotates.
    pub fn duration_until_reset(&self, now: Instant, window_length: Duration) -> Duration {
        window_length.saturating_sub(self.elapsed(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(30);

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn test_new_state_is_zeroed() {
        let now = Instant::now();
        let state = ClientRateState::new(now);
        assert_eq!(state.current_count(), 0);
        assert_eq!(state.previous_count(), 0);
        assert_eq!(state.window_start(), now);
        assert_eq!(state.estimated_rate(now, WINDOW), 0.0);
    }

    #[test]
    fn test_no_rotation_inside_window() {
        let t0 = Instant::now();
        let mut state = ClientRateState::new(t0);
        state.increment();

        assert!(!state.rotate_if_expired(t0 + secs(29), WINDOW));
        assert_eq!(state.current_count(), 1);
        assert_eq!(state.window_start(), t0);
    }

    #[test]
    fn test_rotation_freezes_current_count() {
        let t0 = Instant::now();
        let mut state = ClientRateState::new(t0);
        for _ in 0..7 {
            state.increment();
        }

        assert!(state.rotate_if_expired(t0 + secs(30), WINDOW));
        assert_eq!(state.previous_count(), 7);
        assert_eq!(state.current_count(), 0);
        assert_eq!(state.window_start(), t0 + secs(30));
    }

    #[test]
    fn test_rotation_after_two_idle_windows_drops_history() {
        let t0 = Instant::now();
        let mut state = ClientRateState::new(t0);
        for _ in 0..7 {
            state.increment();
        }

        assert!(state.rotate_if_expired(t0 + secs(60), WINDOW));
        assert_eq!(state.previous_count(), 0);
        assert_eq!(state.current_count(), 0);
    }

    #[test]
    fn test_elapsed_fraction_clamps_backward_time() {
        let t0 = Instant::now();
        let state = ClientRateState::new(t0 + secs(10));

        assert_eq!(state.elapsed(t0), Duration::ZERO);
        assert_eq!(state.elapsed_fraction(t0, WINDOW), 0.0);
    }

    #[test]
    fn test_estimated_rate_decays_previous_window() {
        let t0 = Instant::now();
        let mut state = ClientRateState::new(t0);
        for _ in 0..20 {
            state.increment();
        }
        state.rotate_if_expired(t0 + secs(30), WINDOW);
        state.increment();

        // Halfway through the new window: 20 * 0.5 + 1
        assert_eq!(state.estimated_rate(t0 + secs(45), WINDOW), 11.0);
    }

    #[test]
    fn test_duration_until_reset() {
        let t0 = Instant::now();
        let state = ClientRateState::new(t0);
        assert_eq!(state.duration_until_reset(t0 + secs(12), WINDOW), secs(18));
        assert_eq!(state.duration_until_reset(t0 + secs(40), WINDOW), Duration::ZERO);
    }

    #[test]
    fn test_touch_never_moves_backward() {
        let t0 = Instant::now();
        let mut state = ClientRateState::new(t0 + secs(5));
        state.touch(t0);
        assert_eq!(state.last_seen(), t0 + secs(5));
        state.touch(t0 + secs(9));
        assert_eq!(state.last_seen(), t0 + secs(9));
    }
}
