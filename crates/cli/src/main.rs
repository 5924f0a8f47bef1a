//! Bulwark CLI - Command-line interface for Bulwark
//!
//! Usage:
//!   bulwark init [dir]                     - Write a default bulwark.yaml
//!   bulwark serve --config <file>          - Serve the HTTP gateway
//!   bulwark audit query [filters]          - Query the audit trail
//!   bulwark limits show                    - Print the rate-limit table
//!   bulwark limits check --class <c> --identifier <id>

use clap::{Parser, Subcommand};
use cli::commands::{AuditCommand, InitCommand, LimitsCommand, ServeCommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bulwark")]
#[command(about = "Bulwark - Request rate limiting and audit governance")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init(InitCommand),
    /// Serve the HTTP gateway
    Serve(ServeCommand),
    /// Audit trail operations
    Audit(AuditCommand),
    /// Rate-limit inspection
    Limits(LimitsCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init(cmd) => cmd.run(),
        Commands::Serve(cmd) => cmd.run().await,
        Commands::Audit(cmd) => cmd.run().await,
        Commands::Limits(cmd) => cmd.run().await,
    }
}
