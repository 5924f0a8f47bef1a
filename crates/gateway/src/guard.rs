//! Rate-limit guard for plain handlers and whole routes

use crate::context::{peer_addr, request_context};
use crate::response::{apply_rate_limit_headers, rate_limited_response};
use crate::router::AppState;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use identity::IdentifierResolver;
use ratelimit::RateLimiter;
use shared::{Clock, OperationClass, RequestContext};
use std::future::Future;

/// Run `next` if the caller is within the class budget.
///
/// Admitted responses carry the `X-RateLimit-*` headers; rejected calls get the
/// 429 response and `next` never runs. No audit entry is written here.
pub async fn guard<F, Fut>(
    limiter: &RateLimiter,
    resolver: &IdentifierResolver,
    class: OperationClass,
    ctx: &RequestContext,
    next: F,
) -> Response
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Response>,
{
    let identifier = resolver.resolve(ctx);
    match limiter.guard(class, &identifier, next).await {
        Ok((decision, mut response)) => {
            apply_rate_limit_headers(response.headers_mut(), &decision);
            response
        }
        Err(decision) => rate_limited_response(&decision, limiter.clock().now_ms()),
    }
}

/// State for [`rate_limit`]: which class a route is charged against
#[derive(Clone)]
pub struct ClassGuard {
    state: AppState,
    class: OperationClass,
}

impl ClassGuard {
    pub fn new(state: AppState, class: OperationClass) -> Self {
        Self { state, class }
    }
}

/// `axum::middleware::from_fn_with_state` adapter around [`guard`]
pub async fn rate_limit(State(guarded): State<ClassGuard>, request: Request, next: Next) -> Response {
    let governance = &guarded.state.governance;
    let ctx = request_context(
        request.headers(),
        peer_addr(request.extensions()),
        guarded.state.identity.as_ref(),
    );

    guard(
        governance.limiter(),
        governance.resolver(),
        guarded.class,
        &ctx,
        || next.run(request),
    )
    .await
}
