//! # Bulwark Audit
//!
//! Append-only audit trail for security- and administration-relevant
//! actions. Reading the trail is itself audited.

mod emitter;
mod entry;
mod file_store;
mod query;
mod redact;
mod store;

pub mod actions;

pub use emitter::{default_severity, in_meta_log_scope, AuditEmitter, AuditEvent, Resource};
pub use entry::{AuditCategory, AuditLogEntry, AuditSeverity, EntryId};
pub use file_store::JsonLinesAuditStore;
pub use query::{AuditFilter, AuditQueryEngine, AuditQueryResult, AuditStatistics, FilterParams, TimeRange};
pub use redact::{redact_metadata, sanitize_error_message, REDACTED};
pub use store::{AuditStore, AuditStoreError, MemoryAuditStore};
