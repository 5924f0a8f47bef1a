//! bulwark limits command

use super::load_config;
use clap::{Args, Subcommand};
use console::style;
use governance::Governance;
use ratelimit::RateLimitDecision;
use shared::{Clock, OperationClass, RateLimitTable};

#[derive(Debug, Args)]
pub struct LimitsCommand {
    /// Configuration file (YAML or JSON)
    #[arg(short, long, global = true)]
    pub config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    pub command: LimitsSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum LimitsSubcommand {
    /// Print the effective rate-limit table
    Show,
    /// Count one request against the configured store. Fails when rejected.
    Check {
        /// Operation class (auth, payment, enrollment, admin, api)
        #[arg(long)]
        class: OperationClass,
        /// Caller identifier (principal id or client address)
        #[arg(long)]
        identifier: String,
    },
}

impl LimitsCommand {
    pub async fn run(&self) -> anyhow::Result<()> {
        let config = load_config(self.config.as_deref())?;

        match &self.command {
            LimitsSubcommand::Show => {
                println!("{}", style("Rate limits").bold());
                print!("{}", render_table(&config.rate_limits));
            }
            LimitsSubcommand::Check { class, identifier } => {
                let governance = Governance::from_config(config).await?;
                let limiter = governance.limiter();
                if !limiter.is_enforcing() {
                    println!("{} No counter store: decision is fail-open", style("!").yellow().bold());
                }
                let decision = limiter.check(*class, identifier).await;
                let now_ms = limiter.clock().now_ms();
                println!("{}", render_decision(&decision, now_ms));
                decision.into_result(*class, now_ms)?;
            }
        }
        Ok(())
    }
}

/// One row per class: name, limit, window
pub fn render_table(table: &RateLimitTable) -> String {
    let mut out = format!("{:<12} {:>12} {:>12}\n", "CLASS", "MAX", "WINDOW");
    for (class, rule) in table.iter() {
        out.push_str(&format!(
            "{:<12} {:>12} {:>12}\n",
            class.as_str(),
            rule.max_requests,
            format_window(rule.window_ms)
        ));
    }
    out
}

fn format_window(window_ms: u64) -> String {
    match window_ms {
        ms if ms % 3_600_000 == 0 => format!("{}h", ms / 3_600_000),
        ms if ms % 60_000 == 0 => format!("{}m", ms / 60_000),
        ms if ms % 1_000 == 0 => format!("{}s", ms / 1_000),
        ms => format!("{ms}ms"),
    }
}

fn render_decision(decision: &RateLimitDecision, now_ms: i64) -> String {
    let verdict = if decision.allowed {
        style("allowed").green().to_string()
    } else {
        style("rejected").red().to_string()
    };
    format!(
        "{verdict}: {}/{} remaining, resets in {}s",
        decision.remaining,
        decision.limit,
        decision.retry_after_secs(now_ms)
    )
}
