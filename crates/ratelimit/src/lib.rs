//! # Bulwark Rate Limit
//!
//! Per-class, per-caller request throttling. Counters live in a shared store
//! with atomic increment-with-expiry so every process instance sees the same
//! window. When the store is missing or unreachable, checks fail open.

mod memory_store;
mod rate_limiter;
mod redis_store;
mod store;

pub use memory_store::MemoryCounterStore;
pub use rate_limiter::{RateLimitDecision, RateLimiter};
pub use redis_store::RedisCounterStore;
pub use store::{CounterStore, StoreError, WindowCount};
