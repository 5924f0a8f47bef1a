//! Action taxonomy
//!
//! Well-known action names. Callers may record other actions; these are the
//! ones governance itself emits or that dashboards group on.

/// Reading the audit trail. Reserved: `AuditEmitter::emit` drops it unless
/// it comes from `AuditEmitter::record_access`.
pub const AUDIT_LOG_ACCESSED: &str = "audit_log_accessed";
pub const RATE_LIMIT_EXCEEDED: &str = "rate_limit_exceeded";

pub const LOGIN_SUCCEEDED: &str = "login_succeeded";
pub const LOGIN_FAILED: &str = "login_failed";
pub const LOGOUT: &str = "logout";
pub const PASSWORD_RESET_REQUESTED: &str = "password_reset_requested";

pub const USER_ROLE_CHANGED: &str = "user_role_changed";
pub const USER_DELETED: &str = "user_deleted";
pub const COURSE_CREATED: &str = "course_created";
pub const COURSE_UPDATED: &str = "course_updated";
pub const COURSE_DELETED: &str = "course_deleted";
pub const SETTINGS_UPDATED: &str = "settings_updated";

pub const PAYMENT_INITIATED: &str = "payment_initiated";
pub const PAYMENT_COMPLETED: &str = "payment_completed";
pub const PAYMENT_FAILED: &str = "payment_failed";
pub const REFUND_ISSUED: &str = "refund_issued";

pub const CERTIFICATE_GENERATED: &str = "certificate_generated";
pub const INVOICE_GENERATED: &str = "invoice_generated";
pub const DATA_EXPORTED: &str = "data_exported";

/// Actions only the audit-access recorder may write
pub const META_ACTIONS: &[&str] = &[AUDIT_LOG_ACCESSED];

pub fn is_meta_action(action: &str) -> bool {
    META_ACTIONS.contains(&action)
}
