//! CLI Commands

pub mod audit;
pub mod init;
pub mod limits;
pub mod serve;

pub use audit::AuditCommand;
pub use init::InitCommand;
pub use limits::LimitsCommand;
pub use serve::ServeCommand;

use anyhow::Context;
use shared::GovernanceConfig;
use std::path::Path;

/// Load configuration from `path` (defaults when absent), then apply `BULWARK_*` overrides
pub fn load_config(path: Option<&Path>) -> anyhow::Result<GovernanceConfig> {
    let config = match path {
        Some(path) => GovernanceConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => GovernanceConfig::default(),
    };
    Ok(config.apply_env_overrides()?)
}
