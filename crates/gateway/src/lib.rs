//! # Bulwark Gateway
//!
//! axum adapter: builds a `RequestContext` from HTTP requests, enforces the
//! 429 contract and serves the audit query endpoint.

mod context;
mod guard;
mod response;
mod router;

pub use context::{request_context, ClientRequest, HeaderIdentityProvider, IdentityProvider, NoIdentityProvider};
pub use guard::{guard, rate_limit, ClassGuard};
pub use response::{apply_rate_limit_headers, rate_limited_response, ApiError};
pub use router::{build_router, AppState};
