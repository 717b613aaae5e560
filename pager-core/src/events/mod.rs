//! Engine events
//!
//! Two event families flow through the pager:
//!
//! 1. **Inbound** ([`EngineEvent`]): what upstream callers and the timeout
//!    scheduler feed into the engine.
//! 2. **Outbound** ([`PagerEvent`]): what the engine decided, broadcast on the
//!    [`EventBus`] for observers (audit log, stdout sink, tests).
//!
//! ```text
//! ┌──────────────┐  EngineEvent  ┌──────────────┐  PagerEvent  ┌──────────────┐
//! │  Upstream /  │──────────────▶│  Escalation  │─────────────▶│  Event Bus   │
//! │  Scheduler   │               │    Engine    │              │  (broadcast) │
//! └──────────────┘               └──────────────┘              └──────────────┘
//! ```

pub mod bus;
pub mod types;

pub use bus::{EventBus, SharedEventBus, CHANNEL_CAPACITY};
pub use types::{EngineEvent, PagerEvent};
