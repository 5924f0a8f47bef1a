//! AuditEmitter - builds and persists audit entries
//!
//! Emission is best-effort: a failed or slow store is logged and swallowed so
//! the governed operation never fails because of its audit trail.

use crate::actions::{self, AUDIT_LOG_ACCESSED};
use crate::entry::{AuditCategory, AuditLogEntry, AuditSeverity, EntryId};
use crate::redact::redact_metadata;
use crate::store::AuditStore;
use shared::{Actor, Clock, Metadata, MetadataValue, RequestContext, SystemClock};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

const DEFAULT_TIMEOUT: Duration = Duration::from_millis(250);

tokio::task_local! {
    /// Set while an audit-access record is being written
    static META_LOG_SCOPE: ();
}

/// Severity used when the caller does not pick one
pub fn default_severity(success: bool) -> AuditSeverity {
    if success {
        AuditSeverity::Info
    } else {
        AuditSeverity::Warning
    }
}

/// The object an action was performed on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub resource_type: String,
    pub resource_id: Option<String>,
}

impl Resource {
    pub fn new(resource_type: impl Into<String>, resource_id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            resource_id: Some(resource_id.into()),
        }
    }

    /// A resource type with no specific instance
    pub fn kind(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            resource_id: None,
        }
    }
}

/// An action to be recorded
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEvent {
    pub action: String,
    pub category: AuditCategory,
    pub severity: Option<AuditSeverity>,
    pub actor: Actor,
    pub resource: Option<Resource>,
    pub metadata: Metadata,
    pub success: bool,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl AuditEvent {
    /// A successful action by the system actor
    pub fn new(action: impl Into<String>, category: AuditCategory) -> Self {
        Self {
            action: action.into(),
            category,
            severity: None,
            actor: Actor::system(),
            resource: None,
            metadata: Metadata::new(),
            success: true,
            ip_address: None,
            user_agent: None,
        }
    }

    pub fn actor(mut self, actor: Actor) -> Self {
        self.actor = actor;
        self
    }

    pub fn severity(mut self, severity: AuditSeverity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn resource(mut self, resource: Resource) -> Self {
        self.resource = Some(resource);
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata.extend(metadata);
        self
    }

    pub fn success(mut self, success: bool) -> Self {
        self.success = success;
        self
    }

    /// Take provenance (client address, user agent) from the request
    pub fn request(mut self, ctx: &RequestContext) -> Self {
        self.ip_address = ctx.client_ip().map(str::to_string);
        self.user_agent = ctx.user_agent.clone();
        self
    }

    /// Explicit severity, or the default for the outcome
    pub fn effective_severity(&self) -> AuditSeverity {
        self.severity.unwrap_or_else(|| default_severity(self.success))
    }
}

/// Audit emitter
#[derive(Debug, Clone)]
pub struct AuditEmitter {
    store: Arc<dyn AuditStore>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl AuditEmitter {
    /// Create a new AuditEmitter
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn store(&self) -> &Arc<dyn AuditStore> {
        &self.store
    }

    /// Persist an event.
    ///
    /// Returns the new entry id, or `None` when persistence failed or the
    /// action is reserved for [`record_access`](Self::record_access). Never errors.
    pub async fn emit(&self, event: AuditEvent) -> Option<EntryId> {
        if actions::is_meta_action(&event.action) && !in_meta_log_scope() {
            warn!(action = %event.action, "Refusing to record reserved audit action");
            return None;
        }
        let entry = self.build_entry(event);

        match tokio::time::timeout(self.timeout, self.store.append(&entry)).await {
            Ok(Ok(())) => {
                debug!(
                    id = %entry.id,
                    action = %entry.action,
                    category = %entry.category,
                    severity = %entry.severity,
                    success = entry.success,
                    "Audit entry recorded"
                );
                Some(entry.id)
            }
            Ok(Err(e)) => {
                error!(action = %entry.action, error = %e, "Failed to persist audit entry");
                None
            }
            Err(_) => {
                error!(
                    action = %entry.action,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Audit store timed out"
                );
                None
            }
        }
    }

    /// Record an administrative action taken through a request.
    ///
    /// Severity is `info` on success and `warning` on failure.
    pub async fn emit_admin_action(
        &self,
        action: impl Into<String>,
        ctx: &RequestContext,
        actor: &Actor,
        resource: Option<Resource>,
        metadata: Metadata,
        success: bool,
    ) -> Option<EntryId> {
        let mut event = AuditEvent::new(action, AuditCategory::AdminAction)
            .actor(actor.clone())
            .with_metadata(metadata)
            .success(success)
            .request(ctx);
        event.resource = resource;
        self.emit(event).await
    }

    /// Record a read of the audit trail.
    ///
    /// Skipped when already inside an access record write, so a store or
    /// hook that reads the trail while persisting this entry cannot trigger
    /// another one.
    pub async fn record_access(&self, ctx: &RequestContext, filters: Metadata, result_count: usize) -> Option<EntryId> {
        if in_meta_log_scope() {
            debug!("Nested audit read inside access record, not logging");
            return None;
        }

        let event = AuditEvent::new(AUDIT_LOG_ACCESSED, AuditCategory::Security)
            .severity(AuditSeverity::Info)
            .actor(ctx.actor())
            .request(ctx)
            .metadata("filters", filters)
            .metadata("resultCount", result_count as u64)
            .resource(Resource::kind("audit_log"));

        META_LOG_SCOPE.scope((), self.emit(event)).await
    }

    fn build_entry(&self, event: AuditEvent) -> AuditLogEntry {
        let severity = event.effective_severity();
        let (resource_type, resource_id) = match event.resource {
            Some(r) => (Some(r.resource_type), r.resource_id),
            None => (None, None),
        };

        AuditLogEntry {
            id: EntryId::generate(),
            timestamp: self.clock.now(),
            action: event.action,
            category: event.category,
            severity,
            actor: event.actor,
            resource_type,
            resource_id,
            metadata: redact_metadata(event.metadata),
            success: event.success,
            ip_address: event.ip_address,
            user_agent: event.user_agent,
        }
    }
}

/// Whether the current task is writing an audit-access record
pub fn in_meta_log_scope() -> bool {
    META_LOG_SCOPE.try_with(|_| ()).is_ok()
}
