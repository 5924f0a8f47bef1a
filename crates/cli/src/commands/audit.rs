//! bulwark audit command

use super::load_config;
use audit::{AuditLogEntry, AuditQueryResult, FilterParams};
use clap::{Args, Subcommand};
use console::style;
use governance::Governance;
use shared::{Actor, RequestContext};
use std::path::PathBuf;

/// Principal recorded for reads made from the command line
pub const CLI_ACTOR_ID: &str = "cli";

#[derive(Debug, Args)]
pub struct AuditCommand {
    #[command(subcommand)]
    pub command: AuditSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum AuditSubcommand {
    /// Query the audit trail (the read itself is recorded)
    Query(QueryArgs),
}

#[derive(Debug, Args)]
pub struct QueryArgs {
    /// Configuration file (YAML or JSON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 1h, 24h, 7d or 30d
    #[arg(long)]
    pub time_range: Option<String>,

    /// auth, admin_action, payment, security, api or all
    #[arg(long)]
    pub category: Option<String>,

    /// info, warning, error, critical or all
    #[arg(long)]
    pub severity: Option<String>,

    #[arg(long)]
    pub actor: Option<String>,

    #[arg(long)]
    pub resource: Option<String>,

    /// Case-insensitive match on the action name
    #[arg(long)]
    pub search: Option<String>,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

impl QueryArgs {
    fn filter_params(&self) -> FilterParams {
        FilterParams {
            time_range: self.time_range.clone(),
            category: self.category.clone(),
            severity: self.severity.clone(),
            actor_id: self.actor.clone(),
            resource_id: self.resource.clone(),
            search_text: self.search.clone(),
        }
    }
}

impl AuditCommand {
    pub async fn run(&self) -> anyhow::Result<()> {
        match &self.command {
            AuditSubcommand::Query(args) => {
                let config = load_config(args.config.as_deref())?;
                if config.audit_file.is_none() {
                    println!(
                        "{} No auditFile configured: querying an empty in-memory trail",
                        style("!").yellow().bold()
                    );
                }
                let governance = Governance::from_config(config).await?;

                let ctx = RequestContext::new().with_principal(Actor::new(CLI_ACTOR_ID, "Command line", "admin"));
                let result = governance.query_audit(&args.filter_params(), &ctx).await?;

                if args.json {
                    println!("{}", serde_json::to_string_pretty(&result)?);
                } else {
                    print!("{}", render_result(&result));
                }
            }
        }
        Ok(())
    }
}

fn render_entry(entry: &AuditLogEntry) -> String {
    let outcome = if entry.success { "ok" } else { "FAILED" };
    let resource = match (&entry.resource_type, &entry.resource_id) {
        (Some(kind), Some(id)) => format!("{kind}/{id}"),
        (Some(kind), None) => kind.clone(),
        _ => "-".to_string(),
    };
    format!(
        "{}  {:<8} {:<13} {:<28} {:<16} {:<24} {}",
        entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
        entry.severity.as_str(),
        entry.category.as_str(),
        entry.action,
        entry.actor.id,
        resource,
        outcome
    )
}

/// Entries as a table followed by the statistics line
pub fn render_result(result: &AuditQueryResult) -> String {
    if result.is_empty() {
        return "No audit entries match the filter.\n".to_string();
    }

    let mut out = String::new();
    for entry in &result.entries {
        out.push_str(&render_entry(entry));
        out.push('\n');
    }
    out.push_str(&format!(
        "\n{} entries, {} failed, {} warning, {} critical\n",
        result.stats.total_count, result.stats.failed_count, result.stats.warning_count, result.stats.critical_count
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use audit::{AuditCategory, AuditSeverity, AuditStatistics, EntryId};
    use chrono::Utc;
    use shared::Metadata;

    fn entry(action: &str, success: bool) -> AuditLogEntry {
        AuditLogEntry {
            id: EntryId::generate(),
            timestamp: Utc::now(),
            action: action.to_string(),
            category: AuditCategory::Payment,
            severity: if success { AuditSeverity::Info } else { AuditSeverity::Warning },
            actor: Actor::new("u-1", "Ada", "student"),
            resource_type: Some("payment".to_string()),
            resource_id: Some("pay-7".to_string()),
            metadata: Metadata::new(),
            success,
            ip_address: None,
            user_agent: None,
        }
    }

    #[test]
    fn test_render_empty_result() {
        let result = AuditQueryResult {
            entries: Vec::new(),
            stats: AuditStatistics::default(),
        };
        assert_eq!(render_result(&result), "No audit entries match the filter.\n");
    }

    #[test]
    fn test_render_entries_and_stats() {
        let entries = vec![entry("payment_failed", false), entry("payment_completed", true)];
        let result = AuditQueryResult {
            stats: AuditStatistics::from_entries(&entries),
            entries,
        };

        let rendered = render_result(&result);
        let lines: Vec<_> = rendered.lines().collect();
        assert!(lines[0].contains("payment_failed") && lines[0].ends_with("FAILED"));
        assert!(lines[1].contains("payment/pay-7") && lines[1].ends_with("ok"));
        assert_eq!(lines.last().copied(), Some("2 entries, 1 failed, 1 warning, 0 critical"));
    }

    #[test]
    fn test_filter_params_from_args() {
        let args = QueryArgs {
            config: None,
            time_range: Some("7d".to_string()),
            category: Some("payment".to_string()),
            severity: None,
            actor: Some("u-1".to_string()),
            resource: None,
            search: Some("refund".to_string()),
            json: false,
        };
        let filter = args.filter_params().parse().unwrap();
        assert_eq!(filter.category, Some(AuditCategory::Payment));
        assert_eq!(filter.actor_id.as_deref(), Some("u-1"));
        assert_eq!(filter.search_text.as_deref(), Some("refund"));
    }
}
