//! bulwark serve command

use super::load_config;
use clap::Args;
use console::style;
use gateway::{build_router, AppState};
use governance::Governance;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing::info;

#[derive(Debug, Args)]
pub struct ServeCommand {
    /// Configuration file (YAML or JSON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to listen on
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    pub bind: SocketAddr,
}

impl ServeCommand {
    pub async fn run(&self) -> anyhow::Result<()> {
        let config = load_config(self.config.as_deref())?;
        let governance = Governance::from_config(config).await?;
        let enforcing = governance.limiter().is_enforcing();
        let principal_headers = governance.config().trust_principal_headers;

        let app = build_router(AppState::new(governance));
        let listener = TcpListener::bind(self.bind).await?;
        let local_addr = listener.local_addr()?;

        println!("{} Bulwark gateway listening on http://{}", style("✓").green(), local_addr);
        if !enforcing {
            println!(
                "{} No counter store: rate limits are not enforced",
                style("!").yellow().bold()
            );
        }
        if !principal_headers {
            println!(
                "{} trustPrincipalHeaders is off: callers are unauthenticated and /api/audit answers 401",
                style("!").yellow().bold()
            );
        }
        info!(addr = %local_addr, enforcing, principal_headers, "Gateway started");

        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("Gateway stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler available; serve until the process is killed
        std::future::pending::<()>().await;
    }
}
