//! Error types for Bulwark

use thiserror::Error;

/// Error returned when a request exceeds its operation-class quota
#[derive(Debug, Clone, Error)]
#[error("Rate limit exceeded for '{class}': {limit} requests allowed, retry after {retry_after_secs}s")]
pub struct RateLimitExceededError {
    pub class: String,
    pub limit: u32,
    pub retry_after_secs: u64,
    pub reset_at_ms: i64,
}

/// Error returned when an audit filter value is outside its closed set
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid value '{value}' for filter '{field}'. Allowed values: {}", allowed.join(", "))]
pub struct InvalidFilterError {
    pub field: String,
    pub value: String,
    pub allowed: Vec<String>,
}

impl InvalidFilterError {
    pub fn new(field: impl Into<String>, value: impl Into<String>, allowed: &[&str]) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            allowed: allowed.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// General Bulwark error type
#[derive(Debug, Error)]
pub enum GovernanceError {
    #[error(transparent)]
    RateLimitExceeded(#[from] RateLimitExceededError),

    #[error(transparent)]
    InvalidFilter(#[from] InvalidFilterError),

    /// Counter store or audit store could not be reached.
    /// Never surfaced to end callers.
    #[error("Governance backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl GovernanceError {
    /// Whether this error may be shown to the end caller
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            GovernanceError::RateLimitExceeded(_) | GovernanceError::InvalidFilter(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, GovernanceError>;
