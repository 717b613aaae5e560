//! Pager Core Library
//!
//! Incident-escalation engine: receives health alerts from monitored
//! services, tracks each alert's acknowledgement state, and pages successive
//! levels of a configured policy until a human acknowledges or the policy
//! runs out.
//!
//! # Components
//!
//! - [`escalation`]: the state machine, level traversal and dispatch
//! - [`policy`]: per-service escalation levels and their resolution
//! - [`target`]: mail/SMS notification targets over pluggable transports
//! - [`store`]: alert status persistence (memory, JSON file)
//! - [`timer`]: cancellable acknowledgement timeouts
//! - [`router`]: per-alert ordered event queues
//! - [`events`]: inbound engine events and the outbound event bus
//!
//! # Usage
//!
//! ```ignore
//! use pager_core::{Alert, EscalationEngine, MemoryStatusStore, StaticPolicySource,
//!                  TokioTimeoutScheduler, TransportTargetFactory};
//!
//! let policies = StaticPolicySource::load(path, &TransportTargetFactory::logging())?;
//! let (scheduler, timeouts) = TokioTimeoutScheduler::channel(config.ack_timeout);
//! let engine = EscalationEngine::new(
//!     Arc::new(policies),
//!     Arc::new(MemoryStatusStore::new()),
//!     Arc::new(scheduler),
//! );
//!
//! engine.alert_received(&Alert::new("service1", "disk full")).await?;
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod alert;
pub mod config;
pub mod error;
pub mod escalation;
pub mod events;
pub mod policy;
pub mod router;
pub mod store;
pub mod target;
pub mod timer;

// Re-export key data types
pub use alert::{Alert, AlertId, AlertKey, AlertStatus, HealthStatus, ServiceId};

// Re-export engine types
pub use escalation::{
    AlertState, DeliveryReport, DispatchMode, EngineConfig, EscalationEngine, EscalationOutcome,
    SharedEscalationEngine, StatusChange, SuppressReason,
};

// Re-export collaborator contracts and their bundled implementations
pub use policy::{
    EscalationLevel, EscalationPolicy, PolicyError, PolicyResolver, PolicySource,
    StaticPolicySource,
};
pub use store::{
    JsonFileStatusStore, MemoryStatusStore, SharedStatusStore, StatusStore, StoreError,
    StoreResult,
};
pub use target::{
    Channel, DeliveryError, LogTransport, MailTarget, SmsTarget, Target, TargetFactory, Transport,
    TransportTargetFactory,
};
pub use timer::{TimeoutScheduler, TokioTimeoutScheduler, DEFAULT_ACK_TIMEOUT};

// Re-export runtime plumbing
pub use config::{ConfigError, PagerConfig};
pub use error::{PagerError, PagerResult};
pub use events::{EngineEvent, EventBus, PagerEvent, SharedEventBus, CHANNEL_CAPACITY};
pub use router::{EventRouter, SharedEventRouter};
