//! Request context extraction

use crate::router::AppState;
use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::http::{header, Extensions, HeaderMap};
use shared::{Actor, RequestContext};
use std::convert::Infallible;
use std::fmt::Debug;
use std::net::SocketAddr;

pub const PRINCIPAL_ID_HEADER: &str = "x-principal-id";
pub const PRINCIPAL_NAME_HEADER: &str = "x-principal-name";
pub const PRINCIPAL_ROLE_HEADER: &str = "x-principal-role";
const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";
const REAL_IP_HEADER: &str = "x-real-ip";

const DEFAULT_ROLE: &str = "user";

/// Supplies the verified caller for a request
pub trait IdentityProvider: Send + Sync + Debug {
    /// `None` for unauthenticated requests
    fn authenticate(&self, headers: &HeaderMap) -> Option<Actor>;
}

/// Reads the principal from headers set by an authenticating proxy.
///
/// Only deploy behind a proxy that strips these headers from client input.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderIdentityProvider;

/// Authenticates nobody: every caller is identified by address
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIdentityProvider;

impl IdentityProvider for NoIdentityProvider {
    fn authenticate(&self, _headers: &HeaderMap) -> Option<Actor> {
        None
    }
}

impl IdentityProvider for HeaderIdentityProvider {
    fn authenticate(&self, headers: &HeaderMap) -> Option<Actor> {
        let id = header_str(headers, PRINCIPAL_ID_HEADER)?;
        let display_name = header_str(headers, PRINCIPAL_NAME_HEADER).unwrap_or(id);
        let role = header_str(headers, PRINCIPAL_ROLE_HEADER).unwrap_or(DEFAULT_ROLE);
        Some(Actor::new(id, display_name, role))
    }
}

/// Build the governance view of an HTTP request
pub fn request_context(headers: &HeaderMap, peer: Option<SocketAddr>, identity: &dyn IdentityProvider) -> RequestContext {
    let mut ctx = RequestContext::new();
    if let Some(actor) = identity.authenticate(headers) {
        ctx = ctx.with_principal(actor);
    }
    if let Some(chain) = header_str(headers, FORWARDED_FOR_HEADER) {
        ctx = ctx.with_forwarded_for(chain);
    }
    if let Some(ip) = header_str(headers, REAL_IP_HEADER) {
        ctx = ctx.with_real_ip(ip);
    }
    if let Some(peer) = peer {
        ctx = ctx.with_peer_addr(peer.ip().to_string());
    }
    if let Some(agent) = header_str(headers, header::USER_AGENT.as_str()) {
        ctx = ctx.with_user_agent(agent);
    }
    ctx
}

/// Peer address, when the server was started with connect info
pub(crate) fn peer_addr(extensions: &Extensions) -> Option<SocketAddr> {
    extensions.get::<ConnectInfo<SocketAddr>>().map(|info| info.0)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Extractor yielding the request's `RequestContext`
#[derive(Debug, Clone)]
pub struct ClientRequest(pub RequestContext);

impl FromRequestParts<AppState> for ClientRequest {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let ctx = request_context(&parts.headers, peer_addr(&parts.extensions), state.identity.as_ref());
        Ok(Self(state.governance.resolver().trusted_view(&ctx).into_owned()))
    }
}
