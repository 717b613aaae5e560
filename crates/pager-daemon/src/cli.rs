//! Command-line arguments

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use pager_core::{ConfigError, DispatchMode, PagerConfig};

/// Command-line arguments
///
/// Flags override the `PAGER_*` environment variables.
#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Escalation policy file (.toml, .yaml or .json; overrides PAGER_POLICY_PATH)
    #[arg(long)]
    pub policy: Option<PathBuf>,

    /// JSON status file (overrides PAGER_STATE_PATH; in-memory when unset)
    #[arg(long)]
    pub state: Option<PathBuf>,

    /// Acknowledgement window per level in seconds (overrides PAGER_ACK_TIMEOUT_SECS)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub ack_timeout_secs: Option<u64>,

    /// Stop paging a level at its first failed delivery
    #[arg(long, default_value_t = false)]
    pub fail_fast: bool,
}

impl Args {
    /// Layer the flags over an environment-derived config
    pub fn apply(&self, mut config: PagerConfig) -> PagerConfig {
        if let Some(path) = &self.policy {
            config.policy_path = Some(path.clone());
        }
        if let Some(path) = &self.state {
            config.state_path = Some(path.clone());
        }
        if let Some(secs) = self.ack_timeout_secs {
            config.ack_timeout = Duration::from_secs(secs);
        }
        if self.fail_fast {
            config.dispatch_mode = DispatchMode::FailFast;
        }
        config
    }

    /// Resolve the effective config from the process environment
    pub fn resolve(&self) -> Result<PagerConfig, ConfigError> {
        let config = self.apply(PagerConfig::from_env()?);
        config.require_policy_path()?;
        Ok(config)
    }
}
