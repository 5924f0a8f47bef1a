//! # Bulwark Shared
//!
//! Common types used across all Bulwark crates.

pub mod actor;
pub mod clock;
pub mod config;
pub mod error;
pub mod metadata;
pub mod request;

// Re-exports
pub use actor::*;
pub use clock::*;
pub use config::*;
pub use error::*;
pub use metadata::*;
pub use request::*;
