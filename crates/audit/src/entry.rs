//! Audit entry types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{Actor, InvalidFilterError, Metadata};
use std::fmt;
use std::str::FromStr;

/// Unique, creation-ordered entry identifier (UUIDv7)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(String);

impl EntryId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Audit category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditCategory {
    Auth,
    AdminAction,
    Payment,
    Security,
    Api,
}

impl AuditCategory {
    pub const ALL: [AuditCategory; 5] = [
        AuditCategory::Auth,
        AuditCategory::AdminAction,
        AuditCategory::Payment,
        AuditCategory::Security,
        AuditCategory::Api,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuditCategory::Auth => "auth",
            AuditCategory::AdminAction => "admin_action",
            AuditCategory::Payment => "payment",
            AuditCategory::Security => "security",
            AuditCategory::Api => "api",
        }
    }
}

impl fmt::Display for AuditCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditCategory {
    type Err = InvalidFilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AuditCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s.trim())
            .ok_or_else(|| {
                let allowed: Vec<&str> = AuditCategory::ALL.iter().map(|c| c.as_str()).collect();
                InvalidFilterError::new("category", s, &allowed)
            })
    }
}

/// Audit severity, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl AuditSeverity {
    pub const ALL: [AuditSeverity; 4] = [
        AuditSeverity::Info,
        AuditSeverity::Warning,
        AuditSeverity::Error,
        AuditSeverity::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuditSeverity::Info => "info",
            AuditSeverity::Warning => "warning",
            AuditSeverity::Error => "error",
            AuditSeverity::Critical => "critical",
        }
    }
}

impl fmt::Display for AuditSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditSeverity {
    type Err = InvalidFilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AuditSeverity::ALL
            .into_iter()
            .find(|sev| sev.as_str() == s.trim())
            .ok_or_else(|| {
                let allowed: Vec<&str> = AuditSeverity::ALL.iter().map(|s| s.as_str()).collect();
                InvalidFilterError::new("severity", s, &allowed)
            })
    }
}

/// Audit log entry. Never mutated once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: EntryId,
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub category: AuditCategory,
    pub severity: AuditSeverity,
    pub actor: Actor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parse() {
        assert_eq!("admin_action".parse::<AuditCategory>().unwrap(), AuditCategory::AdminAction);
        let err = "billing".parse::<AuditCategory>().unwrap_err();
        assert_eq!(err.field, "category");
        assert_eq!(err.allowed.len(), 5);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(AuditSeverity::Info < AuditSeverity::Warning);
        assert!(AuditSeverity::Error < AuditSeverity::Critical);
        assert!("fatal".parse::<AuditSeverity>().is_err());
    }

    #[test]
    fn test_entry_ids_unique() {
        let a = EntryId::generate();
        let b = EntryId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_entry_persistence_shape() {
        let entry = AuditLogEntry {
            id: EntryId::generate(),
            timestamp: Utc::now(),
            action: "certificate_generated".to_string(),
            category: AuditCategory::AdminAction,
            severity: AuditSeverity::Info,
            actor: Actor::new("u-1", "Ada", "admin"),
            resource_type: Some("certificate".to_string()),
            resource_id: None,
            metadata: Metadata::new(),
            success: true,
            ip_address: Some("203.0.113.9".to_string()),
            user_agent: None,
        };

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["category"], "admin_action");
        assert_eq!(json["severity"], "info");
        assert_eq!(json["actor"]["displayName"], "Ada");
        assert_eq!(json["resourceType"], "certificate");
        assert_eq!(json["ipAddress"], "203.0.113.9");
        assert!(json.get("resourceId").is_none());

        let back: AuditLogEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back, entry);
    }
}
