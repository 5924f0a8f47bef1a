//! Governance - wires resolver, limiter and audit trail from configuration

use crate::middleware::{GovernanceMiddleware, GovernedOperation};
use audit::{
    AuditCategory, AuditEmitter, AuditQueryEngine, AuditQueryResult, AuditStore, FilterParams,
    JsonLinesAuditStore, MemoryAuditStore,
};
use identity::{IdentifierResolver, IdentifierResolverConfig};
use ratelimit::{CounterStore, RateLimiter, RedisCounterStore};
use shared::{Clock, GovernanceConfig, GovernanceError, OperationClass, RequestContext, Result};
use std::sync::Arc;
use tracing::{info, warn};

/// The assembled governance subsystem
#[derive(Debug, Clone)]
pub struct Governance {
    config: Arc<GovernanceConfig>,
    middleware: GovernanceMiddleware,
    emitter: AuditEmitter,
    query_engine: AuditQueryEngine,
}

impl Governance {
    /// Assemble from already-built parts
    pub fn new(config: GovernanceConfig, limiter: RateLimiter, emitter: AuditEmitter) -> Self {
        let resolver = IdentifierResolver::new(IdentifierResolverConfig {
            trust_forwarded_headers: config.trust_forwarded_headers,
            ..Default::default()
        });
        let middleware = GovernanceMiddleware::new(resolver, limiter, emitter.clone())
            .with_rejection_auditing(config.audit_rejections);
        let query_engine = AuditQueryEngine::new(emitter.clone());

        Self {
            config: Arc::new(config),
            middleware,
            emitter,
            query_engine,
        }
    }

    /// Build from configuration.
    ///
    /// An unreachable Redis is not fatal: rate limiting runs without a
    /// counter store and fails open. An audit file that cannot be opened is.
    pub async fn from_config(config: GovernanceConfig) -> Result<Self> {
        let counter_store = connect_counter_store(&config).await;
        let limiter = RateLimiter::from_config(&config, counter_store);

        let audit_store: Arc<dyn AuditStore> = match &config.audit_file {
            Some(path) => {
                let store = JsonLinesAuditStore::open(path).await.map_err(|e| {
                    GovernanceError::Config(format!("Cannot open audit file {}: {e}", path.display()))
                })?;
                info!(path = %path.display(), "Audit trail persisted to file");
                Arc::new(store)
            }
            None => {
                if config.environment.is_production() {
                    warn!("No audit file configured, audit trail is held in memory only");
                }
                Arc::new(MemoryAuditStore::new())
            }
        };
        let emitter = AuditEmitter::new(audit_store).with_timeout(config.store_timeout());

        Ok(Self::new(config, limiter, emitter))
    }

    /// Use `clock` for window resets, entry timestamps and query ranges
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        let limiter = self.middleware.limiter().clone().with_clock(clock.clone());
        self.emitter = self.emitter.with_clock(clock.clone());
        self.middleware = GovernanceMiddleware::new(self.middleware.resolver().clone(), limiter, self.emitter.clone())
            .with_rejection_auditing(self.config.audit_rejections);
        self.query_engine = AuditQueryEngine::new(self.emitter.clone()).with_clock(clock);
        self
    }

    pub fn config(&self) -> &GovernanceConfig {
        &self.config
    }

    pub fn middleware(&self) -> &GovernanceMiddleware {
        &self.middleware
    }

    pub fn limiter(&self) -> &RateLimiter {
        self.middleware.limiter()
    }

    pub fn resolver(&self) -> &IdentifierResolver {
        self.middleware.resolver()
    }

    pub fn emitter(&self) -> &AuditEmitter {
        &self.emitter
    }

    pub fn query_engine(&self) -> &AuditQueryEngine {
        &self.query_engine
    }

    /// Shorthand for `middleware().wrap(..)`
    pub fn wrap(&self, class: OperationClass, action: impl Into<String>, category: AuditCategory) -> GovernedOperation {
        self.middleware.wrap(class, action, category)
    }

    /// Query the audit trail on behalf of the request's principal.
    ///
    /// Role checks belong to the caller; this only validates and runs the query.
    pub async fn query_audit(&self, params: &FilterParams, ctx: &RequestContext) -> Result<AuditQueryResult> {
        let ctx = self.resolver().trusted_view(ctx);
        self.query_engine.query_params(params, &ctx).await
    }
}

async fn connect_counter_store(config: &GovernanceConfig) -> Option<Arc<dyn CounterStore>> {
    let url = config.redis_url()?;

    match tokio::time::timeout(config.store_timeout() * 4, RedisCounterStore::connect(url)).await {
        Ok(Ok(store)) => {
            info!("Connected to counter store");
            Some(Arc::new(store))
        }
        Ok(Err(e)) => {
            warn!(error = %e, "Counter store unavailable, rate limiting will fail open");
            None
        }
        Err(_) => {
            warn!("Counter store connection timed out, rate limiting will fail open");
            None
        }
    }
}
