//! # Bulwark Governance
//!
//! The integration point for business operations: resolve the caller, check
//! the rate limit, run the operation, record the outcome.

mod governance;
mod middleware;

pub use governance::Governance;
pub use middleware::{Governed, GovernedError, GovernedOperation, GovernanceMiddleware};

// Re-export dependencies
pub use audit::{AuditCategory, AuditEmitter, AuditQueryEngine, AuditSeverity, Resource};
pub use identity::IdentifierResolver;
pub use ratelimit::{RateLimitDecision, RateLimiter};
