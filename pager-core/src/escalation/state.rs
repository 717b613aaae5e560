//! Escalation State: derived alert states and pure status transitions
//!
//! Nothing in this file performs I/O. The engine loads a record, asks these
//! functions what to do and what the record becomes, then persists the
//! result itself.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::alert::{AlertStatus, HealthStatus};

/// State of an alert as seen by the escalation state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "level")]
pub enum AlertState {
    /// No record, or the service was restored
    Healthy,
    /// A level was paged and its acknowledgement window is open
    AwaitingAck(u32),
    /// A human confirmed receipt at this level
    Acknowledged(u32),
    /// The window for this level elapsed without acknowledgement
    TimedOut(u32),
}

impl AlertState {
    /// Derive the state from an optional record
    pub fn of(status: Option<&AlertStatus>) -> Self {
        match status {
            None => Self::Healthy,
            Some(s) if s.status == HealthStatus::Healthy => Self::Healthy,
            Some(s) if s.acknowledged => Self::Acknowledged(s.current_level),
            Some(s) if s.timeout => Self::TimedOut(s.current_level),
            Some(s) => Self::AwaitingAck(s.current_level),
        }
    }
}

impl std::fmt::Display for AlertState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::AwaitingAck(level) => write!(f, "awaiting_ack(L{})", level),
            Self::Acknowledged(level) => write!(f, "acknowledged(L{})", level),
            Self::TimedOut(level) => write!(f, "timed_out(L{})", level),
        }
    }
}

/// A change applied to a status record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusChange {
    /// Level `n` was paged: the record becomes unhealthy at `n` with a fresh window
    LevelNotified(u32),
    /// The window for the current level elapsed
    TimedOut,
    /// A human confirmed receipt
    Acknowledged,
    /// The service was restored
    Healthy,
}

impl AlertStatus {
    /// Return the record as it is after `change`
    pub fn apply(&self, change: StatusChange) -> AlertStatus {
        let mut next = self.clone();
        let now = Utc::now();
        match change {
            StatusChange::LevelNotified(level) => {
                next.status = HealthStatus::Unhealthy;
                next.current_level = level;
                next.acknowledged = false;
                next.timeout = false;
                next.last_notified_at = Some(now);
            }
            StatusChange::TimedOut => {
                next.timeout = true;
            }
            StatusChange::Acknowledged => {
                next.acknowledged = true;
            }
            StatusChange::Healthy => {
                next.status = HealthStatus::Healthy;
                next.current_level = 0;
                next.acknowledged = false;
                next.timeout = false;
            }
        }
        next.updated_at = now;
        next
    }
}

/// Why a level advance was not taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressReason {
    /// Current level was paged and its window is still open
    AwaitingAck,
    /// A human is already engaged
    Acknowledged,
}

impl std::fmt::Display for SuppressReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AwaitingAck => write!(f, "awaiting acknowledgement"),
            Self::Acknowledged => write!(f, "already acknowledged"),
        }
    }
}

/// Whether an alert report may page the next level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceDecision {
    /// Page `level`
    Notify { level: u32 },
    /// The level counter cannot move past `last_level`
    Exhausted { last_level: u32 },
    Suppress(SuppressReason),
}

/// Decide whether a report for an alert in this state pages the next level
///
/// A missing or healthy record starts a new episode. An unhealthy record
/// advances only once the current level has timed out unacknowledged.
pub fn advance_decision(existing: Option<&AlertStatus>) -> AdvanceDecision {
    match AlertState::of(existing) {
        AlertState::Healthy => AdvanceDecision::Notify { level: 1 },
        AlertState::TimedOut(last_level) => match existing.and_then(AlertStatus::next_level) {
            Some(level) => AdvanceDecision::Notify { level },
            None => AdvanceDecision::Exhausted { last_level },
        },
        AlertState::Acknowledged(_) => AdvanceDecision::Suppress(SuppressReason::Acknowledged),
        AlertState::AwaitingAck(_) => AdvanceDecision::Suppress(SuppressReason::AwaitingAck),
    }
}

/// Whether a fired timeout may escalate this record
pub fn timeout_escalates(status: &AlertStatus) -> bool {
    status.is_unhealthy() && !status.acknowledged
}
