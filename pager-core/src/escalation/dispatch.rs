//! Level dispatch: page every target of one escalation level

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::alert::Alert;
use crate::policy::EscalationLevel;
use crate::target::{Channel, DeliveryError};

/// What to do when one target of a level fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Page every target concurrently and collect the failures
    #[default]
    #[serde(alias = "continue")]
    ContinueOnError,
    /// Page targets in order and stop at the first failure
    FailFast,
}

impl std::str::FromStr for DispatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "continue" | "continue_on_error" => Ok(Self::ContinueOnError),
            "fail_fast" | "fail-fast" => Ok(Self::FailFast),
            other => Err(format!(
                "unknown dispatch mode '{}' (expected continue or fail_fast)",
                other
            )),
        }
    }
}

/// One target that did not accept the page
#[derive(Debug, Clone)]
pub struct DeliveryFailure {
    pub channel: Channel,
    pub target: String,
    pub error: DeliveryError,
}

/// Result of paging one level
#[derive(Debug, Clone)]
pub struct DeliveryReport {
    pub level: u32,
    /// Targets a delivery was attempted for
    pub attempted: usize,
    /// Targets never attempted because an earlier one failed (fail-fast only)
    pub skipped: usize,
    pub failures: Vec<DeliveryFailure>,
}

impl DeliveryReport {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn delivered(&self) -> usize {
        self.attempted - self.failures.len()
    }
}

impl std::fmt::Display for DeliveryReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "level {}: {}/{} targets failed",
            self.level,
            self.failures.len(),
            self.attempted + self.skipped
        )?;
        for failure in &self.failures {
            write!(f, "; {}:{} ({})", failure.channel, failure.target, failure.error)?;
        }
        if self.skipped > 0 {
            write!(f, "; {} skipped", self.skipped)?;
        }
        Ok(())
    }
}

/// Pages the targets of a level according to a [`DispatchMode`]
#[derive(Debug, Clone, Copy, Default)]
pub struct Dispatcher {
    mode: DispatchMode,
}

impl Dispatcher {
    pub fn new(mode: DispatchMode) -> Self {
        Self { mode }
    }

    /// Attempt delivery of `alert` to every target of `level`
    pub async fn notify(&self, level: &EscalationLevel, alert: &Alert) -> DeliveryReport {
        let report = match self.mode {
            DispatchMode::ContinueOnError => self.notify_all(level, alert).await,
            DispatchMode::FailFast => self.notify_in_order(level, alert).await,
        };

        for failure in &report.failures {
            warn!(
                alert = %alert.key(),
                level = level.id,
                channel = %failure.channel,
                target = %failure.target,
                error = %failure.error,
                "Target rejected page"
            );
        }
        debug!(
            alert = %alert.key(),
            level = level.id,
            delivered = report.delivered(),
            failed = report.failures.len(),
            skipped = report.skipped,
            "Level dispatch finished"
        );
        report
    }

    async fn notify_all(&self, level: &EscalationLevel, alert: &Alert) -> DeliveryReport {
        let results = join_all(level.targets.iter().map(|t| t.send(alert))).await;

        let failures = level
            .targets
            .iter()
            .zip(results)
            .filter_map(|(target, result)| {
                result.err().map(|error| DeliveryFailure {
                    channel: target.channel(),
                    target: target.value().to_string(),
                    error,
                })
            })
            .collect();

        DeliveryReport {
            level: level.id,
            attempted: level.targets.len(),
            skipped: 0,
            failures,
        }
    }

    async fn notify_in_order(&self, level: &EscalationLevel, alert: &Alert) -> DeliveryReport {
        let mut report = DeliveryReport {
            level: level.id,
            attempted: 0,
            skipped: 0,
            failures: Vec::new(),
        };

        for (index, target) in level.targets.iter().enumerate() {
            report.attempted += 1;
            if let Err(error) = target.send(alert).await {
                report.failures.push(DeliveryFailure {
                    channel: target.channel(),
                    target: target.value().to_string(),
                    error,
                });
                report.skipped = level.targets.len() - index - 1;
                break;
            }
        }

        report
    }
}
