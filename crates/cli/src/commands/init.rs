//! bulwark init command

use clap::Args;
use console::style;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "bulwark.yaml";

pub const DEFAULT_CONFIG: &str = r#"# Bulwark configuration
#
# Environment overrides: BULWARK_ENV, BULWARK_REDIS_URL, BULWARK_AUDIT_FILE

# development | production | test
environment: development

# Shared counter store. Without it every request is admitted (fail-open).
# redisUrl: redis://127.0.0.1:6379

keyPrefix: "ratelimit:"

# Identify anonymous callers by X-Forwarded-For / X-Real-IP.
# Disable when clients connect directly.
trustForwardedHeaders: true

# Accept x-principal-id / -name / -role as the authenticated caller.
# Enable only behind a proxy that authenticates and overwrites them.
trustPrincipalHeaders: false

# Bound on each counter or audit store round trip
storeTimeoutMs: 250

# JSON-lines audit trail. Held in memory when unset.
auditFile: audit.jsonl

# Record a security entry for every rate-limit rejection
auditRejections: false

auditReaderRoles:
  - admin

# Per operation class. Omitted classes keep their defaults.
rateLimits:
  auth:
    maxRequests: 10
    windowMs: 10000
  payment:
    maxRequests: 5
    windowMs: 60000
  enrollment:
    maxRequests: 20
    windowMs: 3600000
  admin:
    maxRequests: 200
    windowMs: 3600000
  api:
    maxRequests: 100
    windowMs: 3600000
"#;

#[derive(Debug, Args)]
pub struct InitCommand {
    /// Directory to initialize
    #[arg(default_value = ".")]
    pub directory: PathBuf,

    /// Overwrite an existing configuration file
    #[arg(long)]
    pub force: bool,
}

impl InitCommand {
    pub fn run(&self) -> anyhow::Result<()> {
        let path = write_default_config(&self.directory, self.force)?;
        println!("{} Wrote {}", style("✓").green(), path.display());
        Ok(())
    }
}

/// Write `bulwark.yaml` into `directory`, returning its path
pub fn write_default_config(directory: &Path, force: bool) -> anyhow::Result<PathBuf> {
    let path = directory.join(CONFIG_FILE_NAME);
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }

    std::fs::create_dir_all(directory)?;
    std::fs::write(&path, DEFAULT_CONFIG)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{GovernanceConfig, OperationClass, RateLimitTable};

    #[test]
    fn test_default_config_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_default_config(dir.path(), false).unwrap();

        let config = GovernanceConfig::from_file(&path).unwrap();
        let defaults = RateLimitTable::default();
        for class in OperationClass::ALL {
            assert_eq!(config.rate_limits.rule(class), defaults.rule(class));
        }
        assert_eq!(config.audit_file.as_deref(), Some(Path::new("audit.jsonl")));
        assert!(config.redis_url().is_none());
        assert!(!config.trust_principal_headers);
    }

    #[test]
    fn test_existing_file_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "environment: test\n").unwrap();

        assert!(write_default_config(dir.path(), false).is_err());
        let kept = std::fs::read_to_string(dir.path().join(CONFIG_FILE_NAME)).unwrap();
        assert_eq!(kept, "environment: test\n");

        write_default_config(dir.path(), true).unwrap();
        let replaced = std::fs::read_to_string(dir.path().join(CONFIG_FILE_NAME)).unwrap();
        assert_eq!(replaced, DEFAULT_CONFIG);
    }
}
