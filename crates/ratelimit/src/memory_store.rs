//! In-process counter store
//!
//! Same window semantics as the Redis store, but scoped to one process.
//! Suitable for tests and single-instance development; under horizontal
//! scaling each instance would count separately and under-count.

use crate::store::{CounterStore, StoreError, WindowCount};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{Clock, SystemClock};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Expired windows are swept once the map grows past this many keys
const SWEEP_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u64,
    expires_at: DateTime<Utc>,
}

/// In-memory counter store
#[derive(Debug)]
pub struct MemoryCounterStore {
    windows: Mutex<HashMap<String, Window>>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryCounterStore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl MemoryCounterStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Number of live (unexpired) windows
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.windows
            .lock()
            .map(|w| w.values().filter(|w| w.expires_at > now).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn increment(&self, key: &str, window: Duration) -> Result<WindowCount, StoreError> {
        let now = self.clock.now();
        let expires_at = chrono::Duration::from_std(window)
            .ok()
            .and_then(|len| now.checked_add_signed(len))
            .ok_or_else(|| StoreError::Unavailable(format!("Window of {:?} is out of range", window)))?;

        let mut windows = self
            .windows
            .lock()
            .map_err(|_| StoreError::Unavailable("Failed to acquire counter lock".to_string()))?;

        if windows.len() >= SWEEP_THRESHOLD {
            windows.retain(|_, w| w.expires_at > now);
        }

        let entry = windows.entry(key.to_string()).or_insert(Window { count: 0, expires_at });
        if entry.expires_at <= now {
            *entry = Window { count: 0, expires_at };
        }
        entry.count += 1;

        let ttl = (entry.expires_at - now).to_std().unwrap_or_default();
        Ok(WindowCount {
            count: entry.count,
            ttl,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::ManualClock;

    fn create_store() -> (MemoryCounterStore, ManualClock) {
        let clock = ManualClock::starting_now();
        (MemoryCounterStore::new(Arc::new(clock.clone())), clock)
    }

    #[tokio::test]
    async fn test_increment_counts_up() {
        let (store, _clock) = create_store();
        let window = Duration::from_secs(10);

        assert_eq!(store.increment("k", window).await.unwrap().count, 1);
        assert_eq!(store.increment("k", window).await.unwrap().count, 2);
        assert_eq!(store.increment("k", window).await.unwrap().count, 3);
    }

    #[tokio::test]
    async fn test_ttl_anchored_to_first_request() {
        let (store, clock) = create_store();
        let window = Duration::from_secs(10);

        let first = store.increment("k", window).await.unwrap();
        assert_eq!(first.ttl, window);

        clock.advance(Duration::from_secs(4));
        let second = store.increment("k", window).await.unwrap();
        assert_eq!(second.ttl, Duration::from_secs(6));
    }

    #[tokio::test]
    async fn test_window_expires() {
        let (store, clock) = create_store();
        let window = Duration::from_secs(10);

        store.increment("k", window).await.unwrap();
        store.increment("k", window).await.unwrap();
        assert_eq!(store.len(), 1);

        clock.advance(Duration::from_secs(10));
        assert!(store.is_empty());

        let fresh = store.increment("k", window).await.unwrap();
        assert_eq!(fresh.count, 1);
        assert_eq!(fresh.ttl, window);
    }

    #[tokio::test]
    async fn test_keys_isolated() {
        let (store, _clock) = create_store();
        let window = Duration::from_secs(10);

        store.increment("a", window).await.unwrap();
        store.increment("a", window).await.unwrap();
        let b = store.increment("b", window).await.unwrap();

        assert_eq!(b.count, 1);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_not_lost() {
        let store = Arc::new(MemoryCounterStore::default());
        let mut handles = Vec::new();

        for _ in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.increment("shared", Duration::from_secs(60)).await.unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let last = store.increment("shared", Duration::from_secs(60)).await.unwrap();
        assert_eq!(last.count, 51);
    }

    #[tokio::test]
    async fn test_out_of_range_window_is_an_error() {
        let (store, _clock) = create_store();
        let result = store.increment("k", Duration::from_millis(u64::MAX)).await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        assert!(store.is_empty());
    }
}
