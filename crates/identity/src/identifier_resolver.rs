//! IdentifierResolver - per-caller rate-limit key resolution

use serde::Serialize;
use shared::RequestContext;
use std::borrow::Cow;
use tracing::debug;

/// Identifier used when nothing else identifies the caller
pub const ANONYMOUS_IDENTIFIER: &str = "anonymous";

/// Identifier resolver configuration
#[derive(Debug, Clone)]
pub struct IdentifierResolverConfig {
    /// Honor `X-Forwarded-For` / `X-Real-IP`. Disable when not behind a proxy.
    pub trust_forwarded_headers: bool,
    pub anonymous_identifier: String,
}

impl Default for IdentifierResolverConfig {
    fn default() -> Self {
        Self {
            trust_forwarded_headers: true,
            anonymous_identifier: ANONYMOUS_IDENTIFIER.to_string(),
        }
    }
}

/// Where a resolved identifier came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierSource {
    Principal,
    ForwardedFor,
    RealIp,
    Peer,
    Anonymous,
}

/// Result of resolving a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub identifier: String,
    pub source: IdentifierSource,
}

/// Identifier resolver
#[derive(Debug, Clone, Default)]
pub struct IdentifierResolver {
    config: IdentifierResolverConfig,
}

impl IdentifierResolver {
    /// Create a new IdentifierResolver
    pub fn new(config: IdentifierResolverConfig) -> Self {
        Self { config }
    }

    /// Resolve the caller key. Never empty.
    pub fn resolve(&self, ctx: &RequestContext) -> String {
        self.resolve_detailed(ctx).identifier
    }

    /// Resolve the caller key together with its source
    pub fn resolve_detailed(&self, ctx: &RequestContext) -> Resolution {
        let resolution = self.try_resolve(ctx).unwrap_or_else(|| Resolution {
            identifier: self.anonymous(),
            source: IdentifierSource::Anonymous,
        });

        debug!(
            identifier = %resolution.identifier,
            source = ?resolution.source,
            "Resolved caller identifier"
        );
        resolution
    }

    /// The request as this resolver sees it: forwarded headers removed
    /// unless they are trusted. Use it for anything recorded about the caller.
    pub fn trusted_view<'a>(&self, ctx: &'a RequestContext) -> Cow<'a, RequestContext> {
        if self.config.trust_forwarded_headers || (ctx.forwarded_for.is_none() && ctx.real_ip.is_none()) {
            Cow::Borrowed(ctx)
        } else {
            Cow::Owned(ctx.clone().without_forwarded())
        }
    }

    fn try_resolve(&self, ctx: &RequestContext) -> Option<Resolution> {
        if let Some(id) = ctx.principal.as_ref().and_then(|p| non_blank(&p.id)) {
            return Some(Resolution {
                identifier: id.to_string(),
                source: IdentifierSource::Principal,
            });
        }

        if self.config.trust_forwarded_headers {
            let first_hop = ctx
                .forwarded_for
                .as_deref()
                .and_then(|chain| chain.split(',').find_map(non_blank));
            if let Some(hop) = first_hop {
                return Some(Resolution {
                    identifier: hop.to_string(),
                    source: IdentifierSource::ForwardedFor,
                });
            }

            if let Some(ip) = ctx.real_ip.as_deref().and_then(non_blank) {
                return Some(Resolution {
                    identifier: ip.to_string(),
                    source: IdentifierSource::RealIp,
                });
            }
        }

        ctx.peer_addr.as_deref().and_then(non_blank).map(|peer| Resolution {
            identifier: peer.to_string(),
            source: IdentifierSource::Peer,
        })
    }

    fn anonymous(&self) -> String {
        non_blank(&self.config.anonymous_identifier)
            .unwrap_or(ANONYMOUS_IDENTIFIER)
            .to_string()
    }
}

fn non_blank(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Actor;

    fn create_resolver() -> IdentifierResolver {
        IdentifierResolver::default()
    }

    // ============== Precedence Tests ==============

    #[test]
    fn test_principal_wins() {
        let ctx = RequestContext::new()
            .with_principal(Actor::new("user-42", "Ada", "student"))
            .with_forwarded_for("203.0.113.9")
            .with_peer_addr("10.0.0.1");

        let resolution = create_resolver().resolve_detailed(&ctx);
        assert_eq!(resolution.identifier, "user-42");
        assert_eq!(resolution.source, IdentifierSource::Principal);
    }

    #[test]
    fn test_blank_principal_is_ignored() {
        let ctx = RequestContext::new()
            .with_principal(Actor::new("  ", "Ghost", "student"))
            .with_peer_addr("10.0.0.1");

        assert_eq!(create_resolver().resolve(&ctx), "10.0.0.1");
    }

    #[test]
    fn test_first_forwarded_hop() {
        let ctx = RequestContext::new()
            .with_forwarded_for("198.51.100.7, 70.41.3.18, 150.172.238.178")
            .with_peer_addr("10.0.0.1");

        let resolution = create_resolver().resolve_detailed(&ctx);
        assert_eq!(resolution.identifier, "198.51.100.7");
        assert_eq!(resolution.source, IdentifierSource::ForwardedFor);
    }

    #[test]
    fn test_forwarded_chain_skips_blank_entries() {
        let ctx = RequestContext::new().with_forwarded_for(" ,  , 198.51.100.7");
        assert_eq!(create_resolver().resolve(&ctx), "198.51.100.7");
    }

    #[test]
    fn test_real_ip_after_forwarded_for() {
        let ctx = RequestContext::new()
            .with_forwarded_for("")
            .with_real_ip("192.0.2.10")
            .with_peer_addr("10.0.0.1");

        let resolution = create_resolver().resolve_detailed(&ctx);
        assert_eq!(resolution.identifier, "192.0.2.10");
        assert_eq!(resolution.source, IdentifierSource::RealIp);
    }

    #[test]
    fn test_peer_fallback() {
        let ctx = RequestContext::new().with_peer_addr("10.0.0.1");

        let resolution = create_resolver().resolve_detailed(&ctx);
        assert_eq!(resolution.identifier, "10.0.0.1");
        assert_eq!(resolution.source, IdentifierSource::Peer);
    }

    #[test]
    fn test_anonymous_fallback() {
        let resolution = create_resolver().resolve_detailed(&RequestContext::new());
        assert_eq!(resolution.identifier, "anonymous");
        assert_eq!(resolution.source, IdentifierSource::Anonymous);
    }

    // ============== Config Tests ==============

    #[test]
    fn test_untrusted_forwarded_headers() {
        let resolver = IdentifierResolver::new(IdentifierResolverConfig {
            trust_forwarded_headers: false,
            ..Default::default()
        });
        let ctx = RequestContext::new()
            .with_forwarded_for("203.0.113.9")
            .with_real_ip("192.0.2.10")
            .with_peer_addr("10.0.0.1");

        assert_eq!(resolver.resolve(&ctx), "10.0.0.1");
    }

    #[test]
    fn test_trusted_view_follows_trust_setting() {
        let ctx = RequestContext::new()
            .with_forwarded_for("6.6.6.6")
            .with_peer_addr("10.0.0.4");

        let trusting = create_resolver().trusted_view(&ctx);
        assert!(matches!(trusting, Cow::Borrowed(_)));
        assert_eq!(trusting.client_ip(), Some("6.6.6.6"));

        let direct = IdentifierResolver::new(IdentifierResolverConfig {
            trust_forwarded_headers: false,
            ..Default::default()
        });
        let view = direct.trusted_view(&ctx);
        assert_eq!(view.client_ip(), Some("10.0.0.4"));
        assert_eq!(view.client_ip(), Some(direct.resolve(&ctx).as_str()));
    }

    #[test]
    fn test_blank_anonymous_identifier_never_empty() {
        let resolver = IdentifierResolver::new(IdentifierResolverConfig {
            anonymous_identifier: String::new(),
            ..Default::default()
        });
        assert_eq!(resolver.resolve(&RequestContext::new()), ANONYMOUS_IDENTIFIER);
    }

    #[test]
    fn test_resolution_serializes_source() {
        let resolution = create_resolver().resolve_detailed(&RequestContext::new());
        let json = serde_json::to_value(&resolution).unwrap();
        assert_eq!(json["source"], "anonymous");
    }
}
