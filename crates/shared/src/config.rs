//! Configuration types for Bulwark

use crate::{GovernanceError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Environment variable overriding `redisUrl`
pub const ENV_REDIS_URL: &str = "BULWARK_REDIS_URL";
/// Environment variable overriding `environment`
pub const ENV_ENVIRONMENT: &str = "BULWARK_ENV";
/// Environment variable overriding `auditFile`
pub const ENV_AUDIT_FILE: &str = "BULWARK_AUDIT_FILE";

/// Longest accepted rate-limit window (31 days)
pub const MAX_WINDOW_MS: u64 = 31 * 24 * 60 * 60 * 1000;

/// Deployment environment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
    Test,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

impl FromStr for Environment {
    type Err = GovernanceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            "test" => Ok(Environment::Test),
            other => Err(GovernanceError::Config(format!("Unknown environment '{}'", other))),
        }
    }
}

/// Class of operation sharing one rate-limit budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationClass {
    Auth,
    Payment,
    Enrollment,
    Admin,
    Api,
}

impl OperationClass {
    pub const ALL: [OperationClass; 5] = [
        OperationClass::Auth,
        OperationClass::Payment,
        OperationClass::Enrollment,
        OperationClass::Admin,
        OperationClass::Api,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationClass::Auth => "auth",
            OperationClass::Payment => "payment",
            OperationClass::Enrollment => "enrollment",
            OperationClass::Admin => "admin",
            OperationClass::Api => "api",
        }
    }
}

impl fmt::Display for OperationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationClass {
    type Err = GovernanceError;

    fn from_str(s: &str) -> Result<Self> {
        OperationClass::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| GovernanceError::Config(format!("Unknown operation class '{}'", s)))
    }
}

/// Fixed `(maxRequests, window)` pair for an operation class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitRule {
    /// Zero means every request is rejected
    pub max_requests: u32,
    pub window_ms: u64,
}

impl RateLimitRule {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window_ms: u64::try_from(window.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

/// Per-class limit table, built once at startup and shared read-only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<OperationClass, RateLimitRule>", into = "BTreeMap<OperationClass, RateLimitRule>")]
pub struct RateLimitTable {
    rules: BTreeMap<OperationClass, RateLimitRule>,
}

impl Default for RateLimitTable {
    fn default() -> Self {
        let mut rules = BTreeMap::new();
        rules.insert(OperationClass::Auth, RateLimitRule::new(10, Duration::from_secs(10)));
        rules.insert(OperationClass::Payment, RateLimitRule::new(5, Duration::from_secs(60)));
        rules.insert(OperationClass::Enrollment, RateLimitRule::new(20, Duration::from_secs(3600)));
        rules.insert(OperationClass::Admin, RateLimitRule::new(200, Duration::from_secs(3600)));
        rules.insert(OperationClass::Api, RateLimitRule::new(100, Duration::from_secs(3600)));
        Self { rules }
    }
}

/// Overrides are merged onto the defaults so every class always has a rule
impl From<BTreeMap<OperationClass, RateLimitRule>> for RateLimitTable {
    fn from(overrides: BTreeMap<OperationClass, RateLimitRule>) -> Self {
        let mut table = Self::default();
        table.rules.extend(overrides);
        table
    }
}

impl From<RateLimitTable> for BTreeMap<OperationClass, RateLimitRule> {
    fn from(table: RateLimitTable) -> Self {
        table.rules
    }
}

impl RateLimitTable {
    /// Replace the rule for a class
    pub fn with_rule(mut self, class: OperationClass, rule: RateLimitRule) -> Self {
        self.rules.insert(class, rule);
        self
    }

    /// Get the rule for a class
    pub fn rule(&self, class: OperationClass) -> RateLimitRule {
        // Every class is seeded by Default, so the fallback is unreachable
        // unless a table was built by hand without it.
        self.rules
            .get(&class)
            .copied()
            .unwrap_or_else(|| RateLimitRule::new(0, Duration::from_secs(1)))
    }

    pub fn iter(&self) -> impl Iterator<Item = (OperationClass, RateLimitRule)> + '_ {
        self.rules.iter().map(|(class, rule)| (*class, *rule))
    }

    /// Reject zero-length windows and windows longer than [`MAX_WINDOW_MS`]
    pub fn validate(&self) -> Result<()> {
        for (class, rule) in self.iter() {
            if rule.window_ms == 0 {
                return Err(GovernanceError::Config(format!(
                    "Rate limit window for '{}' must be positive",
                    class
                )));
            }
            if rule.window_ms > MAX_WINDOW_MS {
                return Err(GovernanceError::Config(format!(
                    "Rate limit window for '{}' must not exceed {}ms",
                    class, MAX_WINDOW_MS
                )));
            }
        }
        Ok(())
    }
}

/// Top-level Bulwark configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GovernanceConfig {
    pub environment: Environment,

    /// Shared counter store. Rate limiting fails open when absent.
    pub redis_url: Option<String>,

    pub key_prefix: String,

    /// Honor `X-Forwarded-For` / `X-Real-IP` when identifying callers
    pub trust_forwarded_headers: bool,

    /// Accept `x-principal-*` headers as the authenticated caller. Only safe
    /// behind a proxy that authenticates and overwrites them.
    pub trust_principal_headers: bool,

    /// Upper bound on a single counter or audit store round trip
    pub store_timeout_ms: u64,

    /// JSON-lines audit file. In-memory when absent.
    pub audit_file: Option<PathBuf>,

    /// Emit a security entry for every rate-limit rejection
    pub audit_rejections: bool,

    /// Roles allowed to read the audit trail
    pub audit_reader_roles: Vec<String>,

    pub rate_limits: RateLimitTable,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            redis_url: None,
            key_prefix: "ratelimit:".to_string(),
            trust_forwarded_headers: true,
            trust_principal_headers: false,
            store_timeout_ms: 250,
            audit_file: None,
            audit_rejections: false,
            audit_reader_roles: vec!["admin".to_string()],
            rate_limits: RateLimitTable::default(),
        }
    }
}

impl GovernanceConfig {
    /// Load configuration from a YAML or JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&content)?,
            _ => serde_yaml::from_str(&content)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Apply `BULWARK_*` environment variable overrides
    pub fn apply_env_overrides(self) -> Result<Self> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(url) = lookup(ENV_REDIS_URL) {
            self.redis_url = Some(url);
        }
        if let Some(env) = lookup(ENV_ENVIRONMENT) {
            self.environment = env.parse()?;
        }
        if let Some(path) = lookup(ENV_AUDIT_FILE) {
            self.audit_file = Some(PathBuf::from(path));
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.store_timeout_ms == 0 {
            return Err(GovernanceError::Config(
                "storeTimeoutMs must be positive".to_string(),
            ));
        }
        self.rate_limits.validate()
    }

    /// Configured Redis URL, ignoring blank values
    pub fn redis_url(&self) -> Option<&str> {
        self.redis_url.as_deref().map(str::trim).filter(|u| !u.is_empty())
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn can_read_audit(&self, role: &str) -> bool {
        self.audit_reader_roles.iter().any(|r| r == role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    // ============== Rate Limit Table Tests ==============

    #[test]
    fn test_default_table() {
        let table = RateLimitTable::default();
        assert_eq!(table.rule(OperationClass::Auth), RateLimitRule::new(10, Duration::from_secs(10)));
        assert_eq!(table.rule(OperationClass::Payment).max_requests, 5);
        assert_eq!(table.rule(OperationClass::Payment).window(), Duration::from_secs(60));
        assert_eq!(table.rule(OperationClass::Enrollment).max_requests, 20);
        assert_eq!(table.rule(OperationClass::Admin).max_requests, 200);
        assert_eq!(table.rule(OperationClass::Api).max_requests, 100);
        assert_eq!(table.iter().count(), 5);
    }

    #[test]
    fn test_partial_override_keeps_defaults() {
        let yaml = r#"
rateLimits:
  auth:
    maxRequests: 3
    windowMs: 1000
"#;
        let config: GovernanceConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.rate_limits.rule(OperationClass::Auth).max_requests, 3);
        assert_eq!(config.rate_limits.rule(OperationClass::Payment).max_requests, 5);
    }

    #[test]
    fn test_zero_window_rejected() {
        let table = RateLimitTable::default()
            .with_rule(OperationClass::Api, RateLimitRule { max_requests: 5, window_ms: 0 });
        assert!(table.validate().is_err());
    }

    #[test]
    fn test_oversized_window_rejected() {
        let yaml = "rateLimits:\n  admin:\n    maxRequests: 0\n    windowMs: 9223372036854775807\n";
        let config: GovernanceConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_err());

        let table = RateLimitTable::default()
            .with_rule(OperationClass::Api, RateLimitRule { max_requests: 5, window_ms: MAX_WINDOW_MS });
        assert!(table.validate().is_ok());
    }

    #[test]
    fn test_zero_max_requests_is_valid() {
        let table = RateLimitTable::default()
            .with_rule(OperationClass::Admin, RateLimitRule::new(0, Duration::from_secs(60)));
        assert!(table.validate().is_ok());
    }

    // ============== Operation Class Tests ==============

    #[test]
    fn test_operation_class_parse() {
        assert_eq!("auth".parse::<OperationClass>().unwrap(), OperationClass::Auth);
        assert_eq!("PAYMENT".parse::<OperationClass>().unwrap(), OperationClass::Payment);
        assert!("uploads".parse::<OperationClass>().is_err());
    }

    // ============== Config Loading Tests ==============

    #[test]
    fn test_config_defaults() {
        let config = GovernanceConfig::default();
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.key_prefix, "ratelimit:");
        assert_eq!(config.store_timeout(), Duration::from_millis(250));
        assert!(config.redis_url().is_none());
        assert!(!config.audit_rejections);
        assert!(config.trust_forwarded_headers);
        assert!(!config.trust_principal_headers);
        assert!(config.can_read_audit("admin"));
        assert!(!config.can_read_audit("student"));
    }

    #[test]
    fn test_config_from_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "environment: production\nredisUrl: redis://127.0.0.1/\nauditRejections: true\ntrustPrincipalHeaders: true\nauditReaderRoles: [admin, auditor]"
        )
        .unwrap();

        let config = GovernanceConfig::from_file(file.path()).unwrap();
        assert!(config.environment.is_production());
        assert_eq!(config.redis_url(), Some("redis://127.0.0.1/"));
        assert!(config.audit_rejections);
        assert!(config.trust_principal_headers);
        assert!(config.can_read_audit("auditor"));
    }

    #[test]
    fn test_config_from_json_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"storeTimeoutMs": 100, "keyPrefix": "rl:"}}"#).unwrap();

        let config = GovernanceConfig::from_file(file.path()).unwrap();
        assert_eq!(config.store_timeout_ms, 100);
        assert_eq!(config.key_prefix, "rl:");
    }

    #[test]
    fn test_config_zero_timeout_rejected() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "storeTimeoutMs: 0").unwrap();
        assert!(GovernanceConfig::from_file(file.path()).is_err());
    }

    #[test]
    fn test_blank_redis_url_ignored() {
        let config = GovernanceConfig {
            redis_url: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(config.redis_url().is_none());
    }

    // ============== Override Tests ==============

    #[test]
    fn test_env_overrides() {
        let mut vars = HashMap::new();
        vars.insert(ENV_REDIS_URL, "redis://cache:6379/");
        vars.insert(ENV_ENVIRONMENT, "prod");
        vars.insert(ENV_AUDIT_FILE, "/var/log/bulwark/audit.jsonl");

        let config = GovernanceConfig::default()
            .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.redis_url(), Some("redis://cache:6379/"));
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.audit_file, Some(PathBuf::from("/var/log/bulwark/audit.jsonl")));
    }

    #[test]
    fn test_env_override_invalid_environment() {
        let result = GovernanceConfig::default().apply_overrides(|key| {
            (key == ENV_ENVIRONMENT).then(|| "staging-ish".to_string())
        });
        assert!(result.is_err());
    }
}
