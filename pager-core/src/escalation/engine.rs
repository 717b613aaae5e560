//! Escalation Engine: event-driven orchestrator
//!
//! Consumes the four inbound events, consults the state machine in
//! [`state`](super::state), persists the resulting record, pages the
//! resolved level and arms the next acknowledgement timeout.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::dispatch::{DispatchMode, Dispatcher};
use super::locks::AlertLocks;
use super::state::{
    advance_decision, timeout_escalates, AdvanceDecision, AlertState, StatusChange, SuppressReason,
};
use crate::alert::{Alert, AlertStatus};
use crate::error::{PagerError, PagerResult};
use crate::events::{EngineEvent, PagerEvent, SharedEventBus};
use crate::policy::{PolicyResolver, PolicySource};
use crate::store::SharedStatusStore;
use crate::timer::TimeoutScheduler;

/// Shared reference to an engine
pub type SharedEscalationEngine = Arc<EscalationEngine>;

/// Configuration for the Escalation Engine
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Behaviour when a target of a level fails
    pub dispatch_mode: DispatchMode,
}

/// What an inbound event did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EscalationOutcome {
    /// `level` was paged
    Notified { level: u32, targets: usize },
    /// No level exists past `last_level`; nobody else can be paged
    Exhausted { last_level: u32 },
    /// The report did not qualify for a new page
    Suppressed { reason: SuppressReason },
    /// The alert is acknowledged at `level`
    Acknowledged { level: u32 },
    /// The alert returned to healthy
    Healthy,
    /// The event had no effect on the record
    Unchanged { state: AlertState },
}

/// The Escalation Engine
pub struct EscalationEngine {
    resolver: PolicyResolver,
    store: SharedStatusStore,
    scheduler: Arc<dyn TimeoutScheduler>,
    dispatcher: Dispatcher,
    locks: AlertLocks,
    bus: Option<SharedEventBus>,
}

impl EscalationEngine {
    /// Create an engine with default config
    pub fn new(
        policies: Arc<dyn PolicySource>,
        store: SharedStatusStore,
        scheduler: Arc<dyn TimeoutScheduler>,
    ) -> Self {
        Self::with_config(policies, store, scheduler, EngineConfig::default())
    }

    /// Create with custom config
    pub fn with_config(
        policies: Arc<dyn PolicySource>,
        store: SharedStatusStore,
        scheduler: Arc<dyn TimeoutScheduler>,
        config: EngineConfig,
    ) -> Self {
        Self {
            resolver: PolicyResolver::new(policies),
            store,
            scheduler,
            dispatcher: Dispatcher::new(config.dispatch_mode),
            locks: AlertLocks::new(),
            bus: None,
        }
    }

    /// Publish decisions on `bus`
    pub fn with_event_bus(mut self, bus: SharedEventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Create a shared reference to this engine
    pub fn shared(self) -> SharedEscalationEngine {
        Arc::new(self)
    }

    /// Route a tagged event to its entry point
    pub async fn handle(&self, event: &EngineEvent) -> PagerResult<EscalationOutcome> {
        match event {
            EngineEvent::AlertReceived { alert } => self.alert_received(alert).await,
            EngineEvent::AcknowledgeTimeoutFired { alert } => self.acknowledge_timeout(alert).await,
            EngineEvent::Acknowledged { alert } => self.alert_acknowledged(alert).await,
            EngineEvent::MarkedHealthy { alert } => self.mark_healthy(alert).await,
        }
    }

    /// A monitored service reported a problem
    ///
    /// Starts an episode for a healthy alert; for an unhealthy one, pages the
    /// next level only if the current level timed out unacknowledged.
    pub async fn alert_received(&self, alert: &Alert) -> PagerResult<EscalationOutcome> {
        let _guard = self.locks.acquire(&alert.key()).await;
        let existing = self.store.get_status(&alert.key()).await?;
        self.advance(alert, existing).await
    }

    /// The acknowledgement window of the current level elapsed
    pub async fn acknowledge_timeout(&self, alert: &Alert) -> PagerResult<EscalationOutcome> {
        let _guard = self.locks.acquire(&alert.key()).await;
        let status = self.require_status(alert, "acknowledge_timeout").await?;

        if !timeout_escalates(&status) {
            debug!(alert = %alert.key(), state = %AlertState::of(Some(&status)), "Timeout ignored");
            return Ok(EscalationOutcome::Unchanged {
                state: AlertState::of(Some(&status)),
            });
        }

        let status = status.apply(StatusChange::TimedOut);
        self.store.update(&status).await?;
        info!(alert = %alert.key(), level = status.current_level, "Acknowledgement timeout elapsed");
        self.publish(PagerEvent::TimeoutFired {
            key: alert.key(),
            level: status.current_level,
            timestamp: Utc::now(),
        });

        self.advance(alert, Some(status)).await
    }

    /// A human acknowledged the alert
    pub async fn alert_acknowledged(&self, alert: &Alert) -> PagerResult<EscalationOutcome> {
        let _guard = self.locks.acquire(&alert.key()).await;
        let status = self.require_status(alert, "alert_acknowledged").await?;
        let state = AlertState::of(Some(&status));

        match state {
            AlertState::Healthy => {
                debug!(alert = %alert.key(), "Acknowledgement of a healthy alert ignored");
                Ok(EscalationOutcome::Unchanged { state })
            }
            AlertState::Acknowledged(level) => Ok(EscalationOutcome::Acknowledged { level }),
            AlertState::AwaitingAck(level) | AlertState::TimedOut(level) => {
                let status = status.apply(StatusChange::Acknowledged);
                self.store.update(&status).await?;
                self.scheduler.cancel(&alert.key());
                info!(alert = %alert.key(), level, "Alert acknowledged");
                self.publish(PagerEvent::Acknowledged {
                    key: alert.key(),
                    level,
                    timestamp: Utc::now(),
                });
                Ok(EscalationOutcome::Acknowledged { level })
            }
        }
    }

    /// The service was restored
    pub async fn mark_healthy(&self, alert: &Alert) -> PagerResult<EscalationOutcome> {
        let _guard = self.locks.acquire(&alert.key()).await;
        let status = self.require_status(alert, "mark_healthy").await?;
        self.scheduler.cancel(&alert.key());

        if !status.is_unhealthy() {
            return Ok(EscalationOutcome::Unchanged {
                state: AlertState::Healthy,
            });
        }

        let status = status.apply(StatusChange::Healthy);
        self.store.update(&status).await?;
        info!(alert = %alert.key(), "Alert marked healthy");
        self.publish(PagerEvent::MarkedHealthy {
            key: alert.key(),
            timestamp: Utc::now(),
        });
        Ok(EscalationOutcome::Healthy)
    }

    /// Level-advance procedure shared by reports and elapsed timeouts.
    /// Caller holds the alert lock.
    async fn advance(
        &self,
        alert: &Alert,
        existing: Option<AlertStatus>,
    ) -> PagerResult<EscalationOutcome> {
        let next_level = match advance_decision(existing.as_ref()) {
            AdvanceDecision::Notify { level } => level,
            AdvanceDecision::Exhausted { last_level } => {
                return Ok(self.exhausted(alert, last_level));
            }
            AdvanceDecision::Suppress(reason) => {
                debug!(alert = %alert.key(), %reason, "Level advance suppressed");
                return Ok(EscalationOutcome::Suppressed { reason });
            }
        };

        let Some(level) = self
            .resolver
            .level_at(&alert.service_id, next_level)
            .await?
        else {
            return Ok(self.exhausted(alert, next_level - 1));
        };

        // A first report is created already notified, so no healthy
        // placeholder record is left behind if the write fails.
        let status = match existing {
            Some(status) => {
                let status = status.apply(StatusChange::LevelNotified(level.id));
                self.store.update(&status).await?;
                status
            }
            None => {
                let status = AlertStatus::new(alert).apply(StatusChange::LevelNotified(level.id));
                self.store.create(status).await?
            }
        };
        debug!(record = %status.summary(), "Status committed");

        info!(
            alert = %alert.key(),
            level = level.id,
            targets = level.targets.len(),
            "Paging escalation level"
        );
        let report = self.dispatcher.notify(&level, alert).await;
        self.scheduler.arm(alert);

        for failure in &report.failures {
            self.publish(PagerEvent::DeliveryFailed {
                key: alert.key(),
                level: level.id,
                target: failure.target.clone(),
                error: failure.error.to_string(),
                timestamp: Utc::now(),
            });
        }
        self.publish(PagerEvent::LevelNotified {
            key: alert.key(),
            level: level.id,
            targets: level.target_values(),
            failed: report.failures.len(),
            timestamp: Utc::now(),
        });

        if report.has_failures() {
            warn!(alert = %alert.key(), %report, "Level paged with delivery failures");
            return Err(PagerError::Delivery(report));
        }

        Ok(EscalationOutcome::Notified {
            level: level.id,
            targets: report.attempted,
        })
    }

    fn exhausted(&self, alert: &Alert, last_level: u32) -> EscalationOutcome {
        info!(alert = %alert.key(), last_level, "Escalation policy exhausted");
        self.publish(PagerEvent::PolicyExhausted {
            key: alert.key(),
            last_level,
            timestamp: Utc::now(),
        });
        EscalationOutcome::Exhausted { last_level }
    }

    async fn require_status(&self, alert: &Alert, event: &'static str) -> PagerResult<AlertStatus> {
        self.store
            .get_status(&alert.key())
            .await?
            .ok_or_else(|| PagerError::PreconditionFailed {
                key: alert.key(),
                event,
            })
    }

    fn publish(&self, event: PagerEvent) {
        if let Some(bus) = &self.bus {
            bus.publish(event);
        }
    }
}
