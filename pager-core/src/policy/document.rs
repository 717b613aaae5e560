//! On-disk policy documents
//!
//! ```toml
//! [[services]]
//! service_id = "service1"
//!
//! [[services.levels]]
//! id = 1
//! targets = [{ channel = "mail", value = "e@email.com" }]
//!
//! [[services.levels]]
//! id = 2
//! targets = [
//!     { channel = "mail", value = "e@email.com" },
//!     { channel = "sms", value = "+34111222333" },
//! ]
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::PolicyError;
use crate::alert::ServiceId;
use crate::target::Channel;

/// Root of a policy file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDocument {
    #[serde(default)]
    pub services: Vec<ServicePolicyDocument>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicePolicyDocument {
    #[serde(alias = "serviceId")]
    pub service_id: ServiceId,
    #[serde(default)]
    pub levels: Vec<LevelDocument>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelDocument {
    pub id: u32,
    #[serde(default)]
    pub targets: Vec<TargetDocument>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetDocument {
    #[serde(alias = "type")]
    pub channel: Channel,
    pub value: String,
}

impl PolicyDocument {
    /// Read and parse a policy file, picking the format by extension
    pub fn from_path(path: &Path) -> Result<Self, PolicyError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        let text = std::fs::read_to_string(path).map_err(|source| PolicyError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let parsed = match ext.as_deref() {
            Some("toml") => toml::from_str(&text).map_err(|e| e.to_string()),
            Some("yaml") | Some("yml") => serde_yaml::from_str(&text).map_err(|e| e.to_string()),
            Some("json") => serde_json::from_str(&text).map_err(|e| e.to_string()),
            _ => return Err(PolicyError::UnsupportedFormat(path.to_path_buf())),
        };

        parsed.map_err(|message| PolicyError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }
}
