//! AuditQueryEngine - filtering and statistics over the audit trail

use crate::emitter::AuditEmitter;
use crate::entry::{AuditCategory, AuditLogEntry, AuditSeverity};
use crate::store::AuditStore;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use shared::{Clock, GovernanceError, InvalidFilterError, Metadata, RequestContext, SystemClock};
use std::cmp::Reverse;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info};

/// Lookback window for a query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeRange {
    #[serde(rename = "1h")]
    LastHour,
    #[default]
    #[serde(rename = "24h")]
    LastDay,
    #[serde(rename = "7d")]
    LastWeek,
    #[serde(rename = "30d")]
    LastMonth,
}

impl TimeRange {
    pub const ALL: [TimeRange; 4] = [
        TimeRange::LastHour,
        TimeRange::LastDay,
        TimeRange::LastWeek,
        TimeRange::LastMonth,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::LastHour => "1h",
            TimeRange::LastDay => "24h",
            TimeRange::LastWeek => "7d",
            TimeRange::LastMonth => "30d",
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            TimeRange::LastHour => Duration::hours(1),
            TimeRange::LastDay => Duration::hours(24),
            TimeRange::LastWeek => Duration::days(7),
            TimeRange::LastMonth => Duration::days(30),
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeRange {
    type Err = InvalidFilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TimeRange::ALL
            .into_iter()
            .find(|r| r.as_str() == s.trim())
            .ok_or_else(|| {
                let allowed: Vec<&str> = TimeRange::ALL.iter().map(|r| r.as_str()).collect();
                InvalidFilterError::new("timeRange", s, &allowed)
            })
    }
}

/// Validated audit filter. All present fields must match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditFilter {
    pub time_range: TimeRange,
    pub category: Option<AuditCategory>,
    pub severity: Option<AuditSeverity>,
    pub actor_id: Option<String>,
    pub resource_id: Option<String>,
    /// Case-insensitive substring of the action name
    pub search_text: Option<String>,
}

impl AuditFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn time_range(mut self, range: TimeRange) -> Self {
        self.time_range = range;
        self
    }

    pub fn category(mut self, category: AuditCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn severity(mut self, severity: AuditSeverity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn actor_id(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }

    pub fn resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn search_text(mut self, text: impl Into<String>) -> Self {
        self.search_text = Some(text.into());
        self
    }

    /// Field predicates other than the time range
    pub fn matches(&self, entry: &AuditLogEntry) -> bool {
        if self.category.is_some_and(|c| c != entry.category) {
            return false;
        }
        if self.severity.is_some_and(|s| s != entry.severity) {
            return false;
        }
        if self.actor_id.as_deref().is_some_and(|id| id != entry.actor.id) {
            return false;
        }
        if self
            .resource_id
            .as_deref()
            .is_some_and(|id| entry.resource_id.as_deref() != Some(id))
        {
            return false;
        }
        if let Some(text) = &self.search_text {
            if !entry.action.to_lowercase().contains(&text.to_lowercase()) {
                return false;
            }
        }
        true
    }

    /// The filter as recorded in an access entry
    pub fn to_metadata(&self) -> Metadata {
        let mut meta = Metadata::new();
        meta.insert("timeRange".to_string(), self.time_range.as_str().into());
        if let Some(category) = self.category {
            meta.insert("category".to_string(), category.as_str().into());
        }
        if let Some(severity) = self.severity {
            meta.insert("severity".to_string(), severity.as_str().into());
        }
        if let Some(actor_id) = &self.actor_id {
            meta.insert("actorId".to_string(), actor_id.clone().into());
        }
        if let Some(resource_id) = &self.resource_id {
            meta.insert("resourceId".to_string(), resource_id.clone().into());
        }
        if let Some(text) = &self.search_text {
            meta.insert("searchText".to_string(), text.clone().into());
        }
        meta
    }
}

/// Unvalidated filter, as received from a query string or CLI flags
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterParams {
    pub time_range: Option<String>,
    pub category: Option<String>,
    pub severity: Option<String>,
    pub actor_id: Option<String>,
    pub resource_id: Option<String>,
    #[serde(alias = "search")]
    pub search_text: Option<String>,
}

impl FilterParams {
    /// Validate against the closed sets. `"all"` and blank mean "no filter".
    pub fn parse(&self) -> Result<AuditFilter, InvalidFilterError> {
        Ok(AuditFilter {
            time_range: match selected(&self.time_range) {
                Some(range) => range.parse()?,
                None => TimeRange::default(),
            },
            category: selected(&self.category).map(str::parse).transpose()?,
            severity: selected(&self.severity).map(str::parse).transpose()?,
            actor_id: non_blank(&self.actor_id),
            resource_id: non_blank(&self.resource_id),
            search_text: non_blank(&self.search_text),
        })
    }
}

impl TryFrom<FilterParams> for AuditFilter {
    type Error = InvalidFilterError;

    fn try_from(params: FilterParams) -> Result<Self, Self::Error> {
        params.parse()
    }
}

fn selected(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("all"))
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Aggregates over a filtered entry set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditStatistics {
    pub total_count: usize,
    pub failed_count: usize,
    pub critical_count: usize,
    pub warning_count: usize,
}

impl AuditStatistics {
    pub fn from_entries(entries: &[AuditLogEntry]) -> Self {
        entries.iter().fold(Self::default(), |mut stats, entry| {
            stats.total_count += 1;
            if !entry.success {
                stats.failed_count += 1;
            }
            match entry.severity {
                AuditSeverity::Critical => stats.critical_count += 1,
                AuditSeverity::Warning => stats.warning_count += 1,
                _ => {}
            }
            stats
        })
    }
}

/// Query result. An empty `entries` is a valid outcome, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditQueryResult {
    pub entries: Vec<AuditLogEntry>,
    pub stats: AuditStatistics,
}

impl AuditQueryResult {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Audit query engine
#[derive(Debug, Clone)]
pub struct AuditQueryEngine {
    store: Arc<dyn AuditStore>,
    emitter: AuditEmitter,
    clock: Arc<dyn Clock>,
}

impl AuditQueryEngine {
    /// Create an engine reading from the emitter's store
    pub fn new(emitter: AuditEmitter) -> Self {
        Self {
            store: emitter.store().clone(),
            emitter,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Run a query and record the access.
    ///
    /// Entries are newest first; equal timestamps keep reverse append order.
    pub async fn query(&self, filter: &AuditFilter, ctx: &RequestContext) -> shared::Result<AuditQueryResult> {
        let since = self.clock.now() - filter.time_range.duration();

        let mut entries = self.store.entries_since(since).await.map_err(|e| {
            error!(error = %e, "Audit query failed");
            GovernanceError::BackendUnavailable(e.to_string())
        })?;

        entries.retain(|entry| filter.matches(entry));
        entries.reverse();
        entries.sort_by_key(|entry| Reverse(entry.timestamp));

        let result = AuditQueryResult {
            stats: AuditStatistics::from_entries(&entries),
            entries,
        };

        info!(
            actor = %ctx.actor().id,
            time_range = %filter.time_range,
            results = result.stats.total_count,
            "Audit trail queried"
        );
        self.emitter
            .record_access(ctx, filter.to_metadata(), result.stats.total_count)
            .await;

        Ok(result)
    }

    /// Validate raw parameters, then query
    pub async fn query_params(&self, params: &FilterParams, ctx: &RequestContext) -> shared::Result<AuditQueryResult> {
        let filter = params.parse()?;
        self.query(&filter, ctx).await
    }
}
