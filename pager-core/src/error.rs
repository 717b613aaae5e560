//! Engine error types
//!
//! Policy exhaustion is not an error; it is reported as an
//! [`EscalationOutcome`](crate::escalation::EscalationOutcome). Everything
//! here is surfaced to the caller of the inbound event unchanged.

use thiserror::Error;

use crate::alert::AlertKey;
use crate::escalation::DeliveryReport;
use crate::policy::PolicyError;
use crate::store::StoreError;

/// Result type alias for engine operations
pub type PagerResult<T> = Result<T, PagerError>;

/// Errors that can occur while processing an engine event
#[derive(Error, Debug)]
pub enum PagerError {
    /// An acknowledge/timeout/healthy event arrived for an alert never received
    #[error("{event} for {key} requires a prior alert_received")]
    PreconditionFailed { key: AlertKey, event: &'static str },

    /// Status store read or write failed
    #[error("status store: {0}")]
    Store(#[from] StoreError),

    /// Policy source failed
    #[error("policy: {0}")]
    Policy(#[from] PolicyError),

    /// One or more targets of the notified level did not accept the page
    #[error("delivery failed: {0}")]
    Delivery(DeliveryReport),
}

impl PagerError {
    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::PreconditionFailed { .. } => "PRECONDITION_FAILED",
            Self::Store(_) => "STORE_FAILURE",
            Self::Policy(_) => "POLICY_FAILURE",
            Self::Delivery(_) => "DELIVERY_FAILURE",
        }
    }

    /// Whether the status write for this event was committed before failing
    pub fn state_committed(&self) -> bool {
        matches!(self, Self::Delivery(_))
    }
}
