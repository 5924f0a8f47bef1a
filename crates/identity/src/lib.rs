//! # Bulwark Identity
//!
//! Derives the stable per-caller key rate limits are counted against.

mod identifier_resolver;

pub use identifier_resolver::{
    IdentifierResolver, IdentifierResolverConfig, IdentifierSource, Resolution, ANONYMOUS_IDENTIFIER,
};
