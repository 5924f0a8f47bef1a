//! GovernanceMiddleware - rate-limit check before, audit entry after

use audit::{actions, sanitize_error_message, AuditCategory, AuditEmitter, AuditEvent, AuditSeverity, EntryId, Resource};
use identity::IdentifierResolver;
use ratelimit::{RateLimitDecision, RateLimiter};
use shared::{Metadata, MetadataValue, OperationClass, RequestContext};
use std::fmt::Display;
use std::future::Future;
use thiserror::Error;
use tracing::debug;

/// Failure of a governed operation
#[derive(Debug, Error)]
pub enum GovernedError<E> {
    /// Rejected before the handler ran
    #[error("Rate limit exceeded")]
    RateLimited(RateLimitDecision),

    /// The handler's own error, unchanged
    #[error("{0}")]
    Handler(E),
}

impl<E> GovernedError<E> {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, GovernedError::RateLimited(_))
    }

    /// The handler error, if that is what failed
    pub fn into_handler_error(self) -> Option<E> {
        match self {
            GovernedError::Handler(e) => Some(e),
            GovernedError::RateLimited(_) => None,
        }
    }
}

/// Successful governed operation
#[derive(Debug, Clone)]
pub struct Governed<T> {
    pub value: T,
    pub decision: RateLimitDecision,
    /// `None` when the audit entry could not be persisted
    pub audit_id: Option<EntryId>,
}

/// Governance middleware
#[derive(Debug, Clone)]
pub struct GovernanceMiddleware {
    resolver: IdentifierResolver,
    limiter: RateLimiter,
    emitter: AuditEmitter,
    audit_rejections: bool,
}

impl GovernanceMiddleware {
    /// Create a new GovernanceMiddleware
    pub fn new(resolver: IdentifierResolver, limiter: RateLimiter, emitter: AuditEmitter) -> Self {
        Self {
            resolver,
            limiter,
            emitter,
            audit_rejections: false,
        }
    }

    /// Record a `rate_limit_exceeded` security entry for every rejection
    pub fn with_rejection_auditing(mut self, enabled: bool) -> Self {
        self.audit_rejections = enabled;
        self
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn resolver(&self) -> &IdentifierResolver {
        &self.resolver
    }

    /// Describe a governed operation. The result can be run for many requests.
    pub fn wrap(&self, class: OperationClass, action: impl Into<String>, category: AuditCategory) -> GovernedOperation {
        GovernedOperation {
            middleware: self.clone(),
            class,
            action: action.into(),
            category,
            resource: None,
            metadata: Metadata::new(),
        }
    }

    async fn record_rejection(&self, ctx: &RequestContext, class: OperationClass, action: &str, identifier: &str, decision: &RateLimitDecision) {
        let event = AuditEvent::new(actions::RATE_LIMIT_EXCEEDED, AuditCategory::Security)
            .severity(AuditSeverity::Warning)
            .actor(ctx.actor())
            .request(ctx)
            .success(false)
            .metadata("operationClass", class.as_str())
            .metadata("attemptedAction", action)
            .metadata("identifier", identifier)
            .metadata("limit", decision.limit)
            .metadata("resetAt", decision.reset_at_epoch_ms);
        self.emitter.emit(event).await;
    }
}

/// A wrapped operation: class, action and category fixed, handler per call
#[derive(Debug, Clone)]
pub struct GovernedOperation {
    middleware: GovernanceMiddleware,
    class: OperationClass,
    action: String,
    category: AuditCategory,
    resource: Option<Resource>,
    metadata: Metadata,
}

impl GovernedOperation {
    pub fn resource(mut self, resource: Resource) -> Self {
        self.resource = Some(resource);
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn class(&self) -> OperationClass {
        self.class
    }

    /// Run `handler` under governance.
    ///
    /// Rejected requests return `RateLimited` without running the handler and
    /// without an audit entry (unless rejection auditing is on). Admitted
    /// requests always produce exactly one entry: `success = true` with the
    /// handler's value, or `success = false` with the sanitized error message
    /// in `metadata.error`, after which the handler's error is returned as is.
    /// Reserved audit-access actions are never recorded this way.
    pub async fn run<F, Fut, T, E>(&self, ctx: &RequestContext, handler: F) -> Result<Governed<T>, GovernedError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mw = &self.middleware;
        let ctx = mw.resolver.trusted_view(ctx);
        let ctx = ctx.as_ref();
        let identifier = mw.resolver.resolve(ctx);
        let decision = mw.limiter.check(self.class, &identifier).await;

        if !decision.allowed {
            if mw.audit_rejections {
                mw.record_rejection(ctx, self.class, &self.action, &identifier, &decision).await;
            }
            return Err(GovernedError::RateLimited(decision));
        }

        let outcome = handler().await;

        let mut event = AuditEvent::new(self.action.clone(), self.category)
            .actor(ctx.actor())
            .request(ctx)
            .with_metadata(self.metadata.clone())
            .success(outcome.is_ok());
        event.resource = self.resource.clone();
        if let Err(e) = &outcome {
            event = event.metadata("error", sanitize_error_message(&e.to_string()));
        }
        let audit_id = mw.emitter.emit(event).await;

        debug!(action = %self.action, class = %self.class, success = outcome.is_ok(), "Governed operation finished");

        match outcome {
            Ok(value) => Ok(Governed {
                value,
                decision,
                audit_id,
            }),
            Err(e) => Err(GovernedError::Handler(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use audit::MemoryAuditStore;
    use shared::{Actor, RateLimitRule, RateLimitTable};
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Debug, PartialEq)]
    struct CertificateError(String);

    impl Display for CertificateError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "certificate failed: {}", self.0)
        }
    }

    fn create_middleware(max_requests: u32) -> (GovernanceMiddleware, MemoryAuditStore) {
        let table = RateLimitTable::default()
            .with_rule(OperationClass::Admin, RateLimitRule::new(max_requests, Duration::from_secs(60)));
        let limiter = RateLimiter::new(Arc::new(table)).with_store(Arc::new(ratelimit::MemoryCounterStore::default()));
        let store = MemoryAuditStore::new();
        let emitter = AuditEmitter::new(Arc::new(store.clone()));
        (
            GovernanceMiddleware::new(IdentifierResolver::default(), limiter, emitter),
            store,
        )
    }

    fn admin_ctx() -> RequestContext {
        RequestContext::new()
            .with_principal(Actor::new("admin-1", "Grace", "admin"))
            .with_peer_addr("10.0.0.5")
    }

    #[tokio::test]
    async fn test_success_records_one_entry() {
        let (mw, store) = create_middleware(10);
        let op = mw
            .wrap(OperationClass::Admin, actions::CERTIFICATE_GENERATED, AuditCategory::AdminAction)
            .resource(Resource::new("certificate", "cert-1"));

        let governed = op
            .run(&admin_ctx(), || async { Ok::<_, CertificateError>("cert-1") })
            .await
            .unwrap();

        assert_eq!(governed.value, "cert-1");
        assert!(governed.audit_id.is_some());
        assert_eq!(governed.decision.remaining, 9);

        let entries = store.snapshot();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].success);
        assert_eq!(entries[0].actor.id, "admin-1");
        assert_eq!(entries[0].ip_address.as_deref(), Some("10.0.0.5"));
        assert_eq!(entries[0].resource_id.as_deref(), Some("cert-1"));
    }

    #[tokio::test]
    async fn test_handler_error_recorded_and_passed_through() {
        let (mw, store) = create_middleware(10);
        let op = mw.wrap(OperationClass::Admin, actions::CERTIFICATE_GENERATED, AuditCategory::AdminAction);

        let err = op
            .run(&admin_ctx(), || async {
                Err::<(), _>(CertificateError("template missing for ada@example.com".to_string()))
            })
            .await
            .unwrap_err();

        assert_eq!(
            err.into_handler_error(),
            Some(CertificateError("template missing for ada@example.com".to_string()))
        );

        let entries = store.snapshot();
        assert_eq!(entries.len(), 1);
        assert!(!entries[0].success);
        assert!(entries[0].severity >= AuditSeverity::Warning);
        assert_eq!(
            entries[0].metadata["error"].as_str(),
            Some("certificate failed: template missing for [EMAIL]")
        );
    }

    #[tokio::test]
    async fn test_rejection_skips_handler_and_audit() {
        let (mw, store) = create_middleware(1);
        let op = mw.wrap(OperationClass::Admin, actions::COURSE_DELETED, AuditCategory::AdminAction);

        op.run(&admin_ctx(), || async { Ok::<_, CertificateError>(()) }).await.unwrap();

        let mut ran = false;
        let err = op
            .run(&admin_ctx(), || {
                ran = true;
                async { Ok::<_, CertificateError>(()) }
            })
            .await
            .unwrap_err();

        assert!(err.is_rate_limited());
        assert!(!ran);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_rejection_auditing_enabled() {
        let (mw, store) = create_middleware(0);
        let mw = mw.with_rejection_auditing(true);
        let op = mw.wrap(OperationClass::Admin, actions::COURSE_DELETED, AuditCategory::AdminAction);

        let err = op.run(&admin_ctx(), || async { Ok::<_, CertificateError>(()) }).await.unwrap_err();
        assert!(err.is_rate_limited());

        let entries = store.snapshot();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, actions::RATE_LIMIT_EXCEEDED);
        assert_eq!(entries[0].category, AuditCategory::Security);
        assert_eq!(entries[0].metadata["attemptedAction"].as_str(), Some(actions::COURSE_DELETED));
    }

    #[tokio::test]
    async fn test_reserved_action_not_recorded() {
        let (mw, store) = create_middleware(10);
        let op = mw.wrap(OperationClass::Admin, actions::AUDIT_LOG_ACCESSED, AuditCategory::Security);

        let governed = op.run(&admin_ctx(), || async { Ok::<_, CertificateError>(7) }).await.unwrap();

        assert_eq!(governed.value, 7);
        assert!(governed.audit_id.is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_static_metadata_attached() {
        let (mw, store) = create_middleware(10);
        let op = mw
            .wrap(OperationClass::Admin, actions::SETTINGS_UPDATED, AuditCategory::AdminAction)
            .metadata("section", "branding");

        op.run(&admin_ctx(), || async { Ok::<_, CertificateError>(()) }).await.unwrap();
        assert_eq!(store.snapshot()[0].metadata["section"].as_str(), Some("branding"));
    }
}
