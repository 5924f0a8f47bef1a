//! Transport-neutral view of an incoming request

use crate::Actor;

/// The parts of a request governance cares about.
///
/// Built by the HTTP adapter from headers and the socket peer; business code
/// and tests may build it directly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Verified principal, if the identity provider authenticated the caller
    pub principal: Option<Actor>,
    /// Raw `X-Forwarded-For` chain
    pub forwarded_for: Option<String>,
    /// Raw `X-Real-IP` value
    pub real_ip: Option<String>,
    /// Direct peer address
    pub peer_addr: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_principal(mut self, actor: Actor) -> Self {
        self.principal = Some(actor);
        self
    }

    pub fn with_forwarded_for(mut self, chain: impl Into<String>) -> Self {
        self.forwarded_for = Some(chain.into());
        self
    }

    pub fn with_real_ip(mut self, ip: impl Into<String>) -> Self {
        self.real_ip = Some(ip.into());
        self
    }

    pub fn with_peer_addr(mut self, addr: impl Into<String>) -> Self {
        self.peer_addr = Some(addr.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Drop `X-Forwarded-For` / `X-Real-IP`, leaving the direct peer
    pub fn without_forwarded(mut self) -> Self {
        self.forwarded_for = None;
        self.real_ip = None;
        self
    }

    /// Best-effort client address: first forwarded hop, then real IP, then peer
    pub fn client_ip(&self) -> Option<&str> {
        self.forwarded_for
            .as_deref()
            .and_then(|chain| chain.split(',').map(str::trim).find(|hop| !hop.is_empty()))
            .or_else(|| non_blank(self.real_ip.as_deref()))
            .or_else(|| non_blank(self.peer_addr.as_deref()))
    }

    /// The principal, or the system actor when unauthenticated
    pub fn actor(&self) -> Actor {
        self.principal.clone().unwrap_or_else(Actor::system)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
