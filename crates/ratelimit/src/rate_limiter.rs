//! RateLimiter - per-class, per-caller throttling

use crate::store::{CounterStore, StoreError};
use serde::Serialize;
use shared::{
    Clock, GovernanceConfig, GovernanceError, OperationClass, RateLimitExceededError, RateLimitRule, RateLimitTable,
    SystemClock,
};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const DEFAULT_KEY_PREFIX: &str = "ratelimit:";
const DEFAULT_TIMEOUT: Duration = Duration::from_millis(250);

/// Set once the "no counter store" warning has been logged
static UNCONFIGURED_WARNED: AtomicBool = AtomicBool::new(false);

/// Outcome of a rate-limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_at_epoch_ms: i64,
}

impl RateLimitDecision {
    /// Decision used when the counter store cannot answer
    fn fail_open(rule: RateLimitRule, now_ms: i64) -> Self {
        Self {
            allowed: true,
            limit: rule.max_requests,
            remaining: rule.max_requests,
            reset_at_epoch_ms: reset_at(now_ms, rule.window_ms),
        }
    }

    /// Seconds until the window resets, rounded up. At least 1 when rejected.
    pub fn retry_after_secs(&self, now_ms: i64) -> u64 {
        let wait_ms = self.reset_at_epoch_ms.saturating_sub(now_ms).max(0) as u64;
        let secs = wait_ms.div_ceil(1000);
        if self.allowed {
            secs
        } else {
            secs.max(1)
        }
    }

    /// `X-RateLimit-*` header pairs
    pub fn headers(&self) -> [(&'static str, String); 3] {
        [
            ("X-RateLimit-Limit", self.limit.to_string()),
            ("X-RateLimit-Remaining", self.remaining.to_string()),
            ("X-RateLimit-Reset", self.reset_at_epoch_ms.to_string()),
        ]
    }

    pub fn to_error(&self, class: OperationClass, now_ms: i64) -> RateLimitExceededError {
        RateLimitExceededError {
            class: class.to_string(),
            limit: self.limit,
            retry_after_secs: self.retry_after_secs(now_ms),
            reset_at_ms: self.reset_at_epoch_ms,
        }
    }

    /// `Ok(self)` when admitted, `RateLimitExceeded` otherwise
    pub fn into_result(self, class: OperationClass, now_ms: i64) -> shared::Result<Self> {
        if self.allowed {
            Ok(self)
        } else {
            Err(GovernanceError::RateLimitExceeded(self.to_error(class, now_ms)))
        }
    }
}

/// `now_ms + after_ms`, clamped instead of overflowing
fn reset_at(now_ms: i64, after_ms: u64) -> i64 {
    now_ms.saturating_add(i64::try_from(after_ms).unwrap_or(i64::MAX))
}

/// Rate limiter
#[derive(Debug, Clone)]
pub struct RateLimiter {
    table: Arc<RateLimitTable>,
    store: Option<Arc<dyn CounterStore>>,
    clock: Arc<dyn Clock>,
    key_prefix: String,
    timeout: Duration,
}

impl RateLimiter {
    /// Create a new RateLimiter with no counter store (fails open)
    pub fn new(table: Arc<RateLimitTable>) -> Self {
        Self {
            table,
            store: None,
            clock: Arc::new(SystemClock),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Build from configuration. Warns once per process when running in
    /// production without a counter store.
    pub fn from_config(config: &GovernanceConfig, store: Option<Arc<dyn CounterStore>>) -> Self {
        if store.is_none() && config.environment.is_production() {
            warn_unconfigured();
        }

        let mut limiter = Self::new(Arc::new(config.rate_limits.clone()))
            .with_key_prefix(config.key_prefix.clone())
            .with_timeout(config.store_timeout());
        limiter.store = store;
        limiter
    }

    pub fn with_store(mut self, store: Arc<dyn CounterStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Whether a counter store is attached
    pub fn is_enforcing(&self) -> bool {
        self.store.is_some()
    }

    pub fn table(&self) -> &RateLimitTable {
        &self.table
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Store key for a class/identifier window
    pub fn window_key(&self, class: OperationClass, identifier: &str) -> String {
        format!("{}{}:{}", self.key_prefix, class, identifier)
    }

    /// Count this request against the caller's window and decide.
    ///
    /// Never fails: store errors and timeouts admit the request.
    pub async fn check(&self, class: OperationClass, identifier: &str) -> RateLimitDecision {
        let rule = self.table.rule(class);
        let now_ms = self.clock.now_ms();

        if rule.max_requests == 0 {
            return RateLimitDecision {
                allowed: false,
                limit: 0,
                remaining: 0,
                reset_at_epoch_ms: reset_at(now_ms, rule.window_ms),
            };
        }

        let Some(store) = &self.store else {
            return RateLimitDecision::fail_open(rule, now_ms);
        };

        let key = self.window_key(class, identifier);
        let window = match self.bounded(store.increment(&key, rule.window())).await {
            Ok(window) => window,
            Err(e) => {
                warn!(%class, identifier, error = %e, "Counter store unavailable, failing open");
                return RateLimitDecision::fail_open(rule, now_ms);
            }
        };

        let limit = u64::from(rule.max_requests);
        let decision = RateLimitDecision {
            allowed: window.count <= limit,
            limit: rule.max_requests,
            remaining: limit.saturating_sub(window.count) as u32,
            reset_at_epoch_ms: reset_at(now_ms, u64::try_from(window.ttl.as_millis()).unwrap_or(u64::MAX)),
        };

        if decision.allowed {
            debug!(%class, identifier, count = window.count, remaining = decision.remaining, "Request admitted");
        } else {
            info!(%class, identifier, count = window.count, limit, "Rate limit exceeded");
        }
        decision
    }

    /// Check, then run `next` only when admitted.
    ///
    /// Returns the rejecting decision instead of running `next`.
    pub async fn guard<F, Fut, T>(
        &self,
        class: OperationClass,
        identifier: &str,
        next: F,
    ) -> Result<(RateLimitDecision, T), RateLimitDecision>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let decision = self.check(class, identifier).await;
        if !decision.allowed {
            return Err(decision);
        }
        Ok((decision, next().await))
    }

    /// Round-trip the counter store within the store timeout
    pub async fn ping_store(&self) -> Result<(), StoreError> {
        let Some(store) = &self.store else {
            return Err(StoreError::Unavailable("no counter store configured".to_string()));
        };
        self.bounded(store.ping()).await
    }

    async fn bounded<T>(&self, call: impl Future<Output = Result<T, StoreError>>) -> Result<T, StoreError> {
        tokio::time::timeout(self.timeout, call)
            .await
            .unwrap_or(Err(StoreError::Timeout(self.timeout)))
    }
}

fn warn_unconfigured() {
    if !UNCONFIGURED_WARNED.swap(true, Ordering::SeqCst) {
        warn!(
            "No counter store configured: rate limiting is DISABLED and every request will be admitted. \
             Set redisUrl (or BULWARK_REDIS_URL) to enforce limits."
        );
    }
}
