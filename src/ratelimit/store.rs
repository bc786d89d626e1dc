//! Concurrent storage for per-client window state.

use dashmap::mapref::one::RefMut;
use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use super::key::ClientKey;
use super::window::ClientRateState;

/// Owns the window state of every client the limiter has seen.
///
/// Entries are created lazily and live until [`evict_idle`](Self::evict_idle)
/// removes them. Access to a single key is serialized through the guard
/// returned by [`get_or_create`](Self::get_or_create); keys in different
/// shards never contend.
#[derive(Debug, Default)]
pub struct WindowStore {
    states: DashMap<ClientKey, ClientRateState>,
}

impl WindowStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            states: DashMap::new(),
        }
    }

    /// Get the state for `key`, creating a zeroed window at `now` if absent.
    ///
    /// Lookup and insertion happen under one shard lock, so concurrent
    /// callers can never create two entries for the same key. The returned
    /// guard keeps the key locked until it is dropped; do not hold it across
    /// an `.await` or while accessing another key.
    pub fn get_or_create(
        &self,
        key: &ClientKey,
        now: Instant,
    ) -> RefMut<'_, ClientKey, ClientRateState> {
        self.states.entry(key.clone()).or_insert_with(|| {
            debug!(key = %key, "Tracking new client");
            ClientRateState::new(now)
        })
    }

    /// Rotate `state` to a new window if its current one has expired.
    pub fn rotate_if_expired(
        state: &mut ClientRateState,
        now: Instant,
        window_length: Duration,
    ) -> bool {
        let rotated = state.rotate_if_expired(now, window_length);
        if rotated {
            trace!(
                previous_count = state.previous_count(),
                "Rotated client window"
            );
        }
        rotated
    }

    /// Count one admitted request for `state`.
    pub fn increment(state: &mut ClientRateState) {
        state.increment();
    }

    /// Copy of the current state for `key`, if the key is tracked.
    pub fn snapshot(&self, key: &ClientKey) -> Option<ClientRateState> {
        self.states.get(key).map(|state| state.clone())
    }

    /// Remove clients that have not been seen for at least `idle_after`.
    ///
    /// Returns the number of entries removed.
    pub fn evict_idle(&self, now: Instant, idle_after: Duration) -> usize {
        let mut removed = 0;
        self.states.retain(|_, state| {
            let keep = now.saturating_duration_since(state.last_seen()) < idle_after;
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    /// Number of tracked clients.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether no clients are tracked.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Forget every client.
    pub fn clear(&self) {
        self.states.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const WINDOW: Duration = Duration::from_secs(30);

    #[test]
    fn test_get_or_create_initializes_zeroed_state() {
        let store = WindowStore::new();
        let now = Instant::now();
        let key = ClientKey::from("10.0.0.1");

        let state = store.get_or_create(&key, now);
        assert_eq!(state.current_count(), 0);
        assert_eq!(state.previous_count(), 0);
        assert_eq!(state.window_start(), now);
        drop(state);

        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_get_or_create_returns_existing_state() {
        let store = WindowStore::new();
        let t0 = Instant::now();
        let key = ClientKey::from("10.0.0.1");

        WindowStore::increment(&mut store.get_or_create(&key, t0));
        let state = store.get_or_create(&key, t0 + Duration::from_secs(1));
        assert_eq!(state.current_count(), 1);
        assert_eq!(state.window_start(), t0);
    }

    #[test]
    fn test_rotate_if_expired_through_store() {
        let store = WindowStore::new();
        let t0 = Instant::now();
        let key = ClientKey::from("10.0.0.1");

        {
            let mut state = store.get_or_create(&key, t0);
            WindowStore::increment(&mut state);
            WindowStore::increment(&mut state);
            assert!(!WindowStore::rotate_if_expired(&mut state, t0, WINDOW));
            assert!(WindowStore::rotate_if_expired(&mut state, t0 + WINDOW, WINDOW));
        }

        let snapshot = store.snapshot(&key).unwrap();
        assert_eq!(snapshot.previous_count(), 2);
        assert_eq!(snapshot.current_count(), 0);
    }

    #[test]
    fn test_snapshot_missing_key() {
        let store = WindowStore::new();
        assert!(store.snapshot(&ClientKey::from("nobody")).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_evict_idle_removes_only_stale_clients() {
        let store = WindowStore::new();
        let t0 = Instant::now();

        drop(store.get_or_create(&ClientKey::from("stale"), t0));
        store
            .get_or_create(&ClientKey::from("fresh"), t0)
            .touch(t0 + Duration::from_secs(50));

        let removed = store.evict_idle(t0 + Duration::from_secs(60), WINDOW * 2);
        assert_eq!(removed, 1);
        assert!(store.snapshot(&ClientKey::from("stale")).is_none());
        assert!(store.snapshot(&ClientKey::from("fresh")).is_some());
    }

    #[test]
    fn test_evict_idle_counts_removals_during_concurrent_inserts() {
        let store = Arc::new(WindowStore::new());
        let t0 = Instant::now();
        let sweep_at = t0 + Duration::from_secs(120);

        for i in 0..500 {
            drop(store.get_or_create(&ClientKey::new(format!("idle-{}", i)), t0));
        }

        let removed = std::thread::scope(|scope| {
            let inserter = {
                let store = Arc::clone(&store);
                scope.spawn(move || {
                    for i in 0..500 {
                        drop(store.get_or_create(&ClientKey::new(format!("new-{}", i)), sweep_at));
                    }
                })
            };
            let removed = store.evict_idle(sweep_at, WINDOW * 2);
            inserter.join().unwrap();
            removed
        });

        assert_eq!(removed, 500);
        assert_eq!(store.len(), 500);
    }

    #[test]
    fn test_clear() {
        let store = WindowStore::new();
        drop(store.get_or_create(&ClientKey::from("a"), Instant::now()));
        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let store = Arc::new(WindowStore::new());
        let now = Instant::now();
        let key = ClientKey::from("shared");

        std::thread::scope(|scope| {
            for _ in 0..8 {
                let store = Arc::clone(&store);
                let key = key.clone();
                scope.spawn(move || {
                    for _ in 0..250 {
                        WindowStore::increment(&mut store.get_or_create(&key, now));
                    }
                });
            }
        });

        assert_eq!(store.len(), 1);
        assert_eq!(store.snapshot(&key).unwrap().current_count(), 2000);
    }
}
