//! Pager configuration
//!
//! Defaults suit a single on-call rotation: a 15-minute acknowledgement
//! window and best-effort paging of every target in a level. Environment
//! variables override the defaults:
//!
//! | Variable                 | Meaning                                   |
//! |--------------------------|-------------------------------------------|
//! | `PAGER_ACK_TIMEOUT_SECS` | acknowledgement window in seconds         |
//! | `PAGER_DISPATCH_MODE`    | `continue` or `fail_fast`                 |
//! | `PAGER_POLICY_PATH`      | escalation policy file (.toml/.yaml/.json)|
//! | `PAGER_STATE_PATH`       | JSON status file; in-memory when unset    |

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::escalation::{DispatchMode, EngineConfig};
use crate::timer::DEFAULT_ACK_TIMEOUT;

/// Errors from reading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: '{value}' ({reason})")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("no escalation policy configured (set PAGER_POLICY_PATH or pass --policy)")]
    MissingPolicy,
}

/// Top-level pager configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagerConfig {
    /// Acknowledgement window per escalation level
    #[serde(with = "duration_secs")]
    pub ack_timeout: Duration,

    /// Behaviour when one target of a level fails
    pub dispatch_mode: DispatchMode,

    /// Escalation policy file
    pub policy_path: Option<PathBuf>,

    /// JSON status file (in-memory store when absent)
    pub state_path: Option<PathBuf>,
}

impl Default for PagerConfig {
    fn default() -> Self {
        Self {
            ack_timeout: DEFAULT_ACK_TIMEOUT,
            dispatch_mode: DispatchMode::default(),
            policy_path: None,
            state_path: None,
        }
    }
}

impl PagerConfig {
    /// Create config from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Create config from an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = lookup("PAGER_ACK_TIMEOUT_SECS") {
            let secs: u64 = value.trim().parse().map_err(|e: std::num::ParseIntError| {
                ConfigError::InvalidValue {
                    var: "PAGER_ACK_TIMEOUT_SECS",
                    value: value.clone(),
                    reason: e.to_string(),
                }
            })?;
            if secs == 0 {
                return Err(ConfigError::InvalidValue {
                    var: "PAGER_ACK_TIMEOUT_SECS",
                    value,
                    reason: "must be greater than zero".to_string(),
                });
            }
            config.ack_timeout = Duration::from_secs(secs);
        }
        if let Some(value) = lookup("PAGER_DISPATCH_MODE") {
            config.dispatch_mode = value.parse().map_err(|reason| ConfigError::InvalidValue {
                var: "PAGER_DISPATCH_MODE",
                value: value.clone(),
                reason,
            })?;
        }
        if let Some(path) = lookup("PAGER_POLICY_PATH") {
            config.policy_path = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup("PAGER_STATE_PATH") {
            config.state_path = Some(PathBuf::from(path));
        }

        Ok(config)
    }

    /// Engine settings derived from this config
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            dispatch_mode: self.dispatch_mode,
        }
    }

    /// Policy path, or an error if none was configured
    pub fn require_policy_path(&self) -> Result<&PathBuf, ConfigError> {
        self.policy_path.as_ref().ok_or(ConfigError::MissingPolicy)
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}
