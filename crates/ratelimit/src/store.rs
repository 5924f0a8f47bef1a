//! Counter store port

use async_trait::async_trait;
use std::fmt::Debug;
use std::time::Duration;
use thiserror::Error;

/// Counter store failure. Always resolved by failing open.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Counter store timed out after {0:?}")]
    Timeout(Duration),

    #[error("Counter store unavailable: {0}")]
    Unavailable(String),
}

/// State of a window right after an increment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCount {
    /// Requests seen in the window, including this one
    pub count: u64,
    /// Time until the window expires
    pub ttl: Duration,
}

/// Shared, atomically incrementable counter store with expiry.
///
/// `increment` must be a single atomic step: bump the counter at `key`,
/// set its time-to-live to `window` when the key is created, and report the
/// new count with the remaining time-to-live. Counts never decrease within a
/// window; expired windows disappear on their own.
#[async_trait]
pub trait CounterStore: Send + Sync + Debug {
    async fn increment(&self, key: &str, window: Duration) -> Result<WindowCount, StoreError>;

    /// Round-trip check used by health endpoints
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
