//! Escalation policies and level resolution
//!
//! A policy is an ordered list of levels per service; each level holds the
//! targets paged together. The engine only ever asks one question of it:
//! "which level has number `n` for this service?". An absent answer is the
//! policy-exhausted signal, never an error.
//!
//! ```text
//! service1
//!   level 1 ── mail e@email.com
//!   level 2 ── mail e@email.com, sms +34111222333
//!   level 3 ── (absent → exhausted, stop paging)
//! ```

pub mod document;

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::alert::ServiceId;
use crate::target::{Target, TargetFactory};

pub use document::{LevelDocument, PolicyDocument, ServicePolicyDocument, TargetDocument};

/// Errors from policy sources
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("failed to read policy file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid policy file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("unsupported policy file format: {0} (expected .toml, .yaml, .yml or .json)")]
    UnsupportedFormat(PathBuf),
}

/// One step of a policy
#[derive(Clone)]
pub struct EscalationLevel {
    /// 1-based level number
    pub id: u32,
    pub targets: Vec<Arc<dyn Target>>,
}

impl EscalationLevel {
    pub fn new(id: u32, targets: Vec<Arc<dyn Target>>) -> Self {
        Self { id, targets }
    }

    /// Destination values, in paging order
    pub fn target_values(&self) -> Vec<String> {
        self.targets.iter().map(|t| t.value().to_string()).collect()
    }
}

impl std::fmt::Debug for EscalationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let targets: Vec<String> = self
            .targets
            .iter()
            .map(|t| format!("{}:{}", t.channel(), t.value()))
            .collect();
        f.debug_struct("EscalationLevel")
            .field("id", &self.id)
            .field("targets", &targets)
            .finish()
    }
}

/// Ordered levels configured for one service
#[derive(Debug, Clone)]
pub struct EscalationPolicy {
    pub service_id: ServiceId,
    pub levels: Vec<EscalationLevel>,
}

impl EscalationPolicy {
    pub fn new(service_id: impl Into<ServiceId>, levels: Vec<EscalationLevel>) -> Self {
        Self {
            service_id: service_id.into(),
            levels,
        }
    }

    /// Policy with no levels: nobody can be paged
    pub fn empty(service_id: impl Into<ServiceId>) -> Self {
        Self::new(service_id, Vec::new())
    }

    /// Level whose identifier equals `number`, if configured
    pub fn level_at(&self, number: u32) -> Option<&EscalationLevel> {
        self.levels.iter().find(|level| level.id == number)
    }
}

/// Trait for the configuration collaborator that owns policies
#[async_trait]
pub trait PolicySource: Send + Sync {
    /// Policy for a service; an unknown service yields an empty policy
    async fn policy(&self, service_id: &str) -> Result<EscalationPolicy, PolicyError>;
}

/// Resolves escalation levels by number
#[derive(Clone)]
pub struct PolicyResolver {
    source: Arc<dyn PolicySource>,
}

impl PolicyResolver {
    pub fn new(source: Arc<dyn PolicySource>) -> Self {
        Self { source }
    }

    /// Level `number` of the service's policy, or `None` when exhausted
    pub async fn level_at(
        &self,
        service_id: &str,
        number: u32,
    ) -> Result<Option<EscalationLevel>, PolicyError> {
        let policy = self.source.policy(service_id).await?;
        let level = policy.level_at(number).cloned();
        debug!(
            service = service_id,
            level = number,
            found = level.is_some(),
            configured = policy.levels.len(),
            "Resolved escalation level"
        );
        Ok(level)
    }
}

/// In-memory policy source
#[derive(Debug, Clone, Default)]
pub struct StaticPolicySource {
    policies: HashMap<ServiceId, EscalationPolicy>,
}

impl StaticPolicySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the policy for its service
    pub fn insert(&mut self, policy: EscalationPolicy) {
        if self.policies.contains_key(&policy.service_id) {
            warn!(service = %policy.service_id, "Replacing existing escalation policy");
        }
        self.policies.insert(policy.service_id.clone(), policy);
    }

    pub fn with_policy(mut self, policy: EscalationPolicy) -> Self {
        self.insert(policy);
        self
    }

    /// Build policies from a parsed document, creating targets via `factory`
    pub fn from_document(document: &PolicyDocument, factory: &dyn TargetFactory) -> Self {
        let mut source = Self::new();
        for service in &document.services {
            let levels = service
                .levels
                .iter()
                .map(|level| {
                    let targets = level
                        .targets
                        .iter()
                        .map(|t| factory.build(t.channel, &t.value))
                        .collect();
                    EscalationLevel::new(level.id, targets)
                })
                .collect();
            source.insert(EscalationPolicy::new(service.service_id.clone(), levels));
        }
        source
    }

    /// Load a policy file (TOML, YAML or JSON by extension)
    pub fn load(path: &Path, factory: &dyn TargetFactory) -> Result<Self, PolicyError> {
        let document = PolicyDocument::from_path(path)?;
        Ok(Self::from_document(&document, factory))
    }

    pub fn service_count(&self) -> usize {
        self.policies.len()
    }
}

#[async_trait]
impl PolicySource for StaticPolicySource {
    async fn policy(&self, service_id: &str) -> Result<EscalationPolicy, PolicyError> {
        Ok(self
            .policies
            .get(service_id)
            .cloned()
            .unwrap_or_else(|| EscalationPolicy::empty(service_id)))
    }
}
