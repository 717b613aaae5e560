//! Alert data model
//!
//! An [`Alert`] is an immutable occurrence report from a monitored service.
//! An [`AlertStatus`] is the mutable tracking record the escalation engine
//! reads and writes once per event, keyed by [`AlertKey`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a single alert occurrence
pub type AlertId = String;

/// Identifier of a monitored service
pub type ServiceId = String;

/// Inbound occurrence report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,
    #[serde(rename = "serviceId", alias = "service_id")]
    pub service_id: ServiceId,
    #[serde(default)]
    pub message: String,
}

impl Alert {
    /// Create an alert with a freshly generated id
    pub fn new(service_id: impl Into<ServiceId>, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            service_id: service_id.into(),
            message: message.into(),
        }
    }

    /// Create an alert with a caller-supplied id
    pub fn with_id(
        id: impl Into<AlertId>,
        service_id: impl Into<ServiceId>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            service_id: service_id.into(),
            message: message.into(),
        }
    }

    /// Key of the status record this alert maps to
    pub fn key(&self) -> AlertKey {
        AlertKey::new(&self.service_id, &self.id)
    }
}

/// Identity of one status record: the (service, alert lineage) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AlertKey {
    pub service_id: ServiceId,
    pub alert_id: AlertId,
}

impl AlertKey {
    pub fn new(service_id: impl Into<ServiceId>, alert_id: impl Into<AlertId>) -> Self {
        Self {
            service_id: service_id.into(),
            alert_id: alert_id.into(),
        }
    }
}

impl std::fmt::Display for AlertKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.service_id, self.alert_id)
    }
}

impl From<&Alert> for AlertKey {
    fn from(alert: &Alert) -> Self {
        alert.key()
    }
}

/// Health of the monitored service as seen by one alert record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    #[default]
    Healthy,
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Mutable escalation-tracking record for one alert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertStatus {
    pub alert_id: AlertId,
    pub service_id: ServiceId,
    pub status: HealthStatus,
    /// Last escalation level that was notified (0 before the first notification)
    pub current_level: u32,
    /// A human confirmed receipt at the current level
    pub acknowledged: bool,
    /// The timeout armed for the current level fired without acknowledgement
    pub timeout: bool,
    pub last_notified_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl AlertStatus {
    /// Fresh record for an alert that has not been notified yet
    pub fn new(alert: &Alert) -> Self {
        Self {
            alert_id: alert.id.clone(),
            service_id: alert.service_id.clone(),
            status: HealthStatus::Healthy,
            current_level: 0,
            acknowledged: false,
            timeout: false,
            last_notified_at: None,
            updated_at: Utc::now(),
        }
    }

    pub fn key(&self) -> AlertKey {
        AlertKey::new(&self.service_id, &self.alert_id)
    }

    pub fn is_unhealthy(&self) -> bool {
        self.status == HealthStatus::Unhealthy
    }

    /// Level the next escalation step would notify; `None` past `u32::MAX`
    pub fn next_level(&self) -> Option<u32> {
        self.current_level.checked_add(1)
    }

    /// Get a summary for logging
    pub fn summary(&self) -> String {
        format!(
            "alert={} status={} level={} acknowledged={} timeout={}",
            self.key(),
            self.status,
            self.current_level,
            self.acknowledged,
            self.timeout,
        )
    }
}
