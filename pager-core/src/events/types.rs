//! Inbound and outbound event types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::alert::{Alert, AlertKey};

/// Events consumed by the escalation engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A monitored service reported a problem (first or repeat report)
    AlertReceived { alert: Alert },

    /// The acknowledgement window for the current level elapsed
    AcknowledgeTimeoutFired { alert: Alert },

    /// A human confirmed receipt
    Acknowledged { alert: Alert },

    /// The service was restored
    MarkedHealthy { alert: Alert },
}

impl EngineEvent {
    pub fn alert(&self) -> &Alert {
        match self {
            Self::AlertReceived { alert }
            | Self::AcknowledgeTimeoutFired { alert }
            | Self::Acknowledged { alert }
            | Self::MarkedHealthy { alert } => alert,
        }
    }

    pub fn key(&self) -> AlertKey {
        self.alert().key()
    }

    /// Get the event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::AlertReceived { .. } => "alert_received",
            Self::AcknowledgeTimeoutFired { .. } => "acknowledge_timeout_fired",
            Self::Acknowledged { .. } => "acknowledged",
            Self::MarkedHealthy { .. } => "marked_healthy",
        }
    }
}

/// Decisions published by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PagerEvent {
    /// Every target of a level was attempted
    LevelNotified {
        key: AlertKey,
        level: u32,
        targets: Vec<String>,
        failed: usize,
        timestamp: DateTime<Utc>,
    },

    /// One target of a level failed to accept the page
    DeliveryFailed {
        key: AlertKey,
        level: u32,
        target: String,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// No level exists past the current one
    PolicyExhausted {
        key: AlertKey,
        last_level: u32,
        timestamp: DateTime<Utc>,
    },

    /// An acknowledgement window elapsed without acknowledgement
    TimeoutFired {
        key: AlertKey,
        level: u32,
        timestamp: DateTime<Utc>,
    },

    /// An alert was acknowledged at a level
    Acknowledged {
        key: AlertKey,
        level: u32,
        timestamp: DateTime<Utc>,
    },

    /// An alert returned to healthy
    MarkedHealthy {
        key: AlertKey,
        timestamp: DateTime<Utc>,
    },
}

impl PagerEvent {
    /// Get the event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::LevelNotified { .. } => "level_notified",
            Self::DeliveryFailed { .. } => "delivery_failed",
            Self::PolicyExhausted { .. } => "policy_exhausted",
            Self::TimeoutFired { .. } => "timeout_fired",
            Self::Acknowledged { .. } => "acknowledged",
            Self::MarkedHealthy { .. } => "marked_healthy",
        }
    }

    pub fn key(&self) -> &AlertKey {
        match self {
            Self::LevelNotified { key, .. }
            | Self::DeliveryFailed { key, .. }
            | Self::PolicyExhausted { key, .. }
            | Self::TimeoutFired { key, .. }
            | Self::Acknowledged { key, .. }
            | Self::MarkedHealthy { key, .. } => key,
        }
    }
}
