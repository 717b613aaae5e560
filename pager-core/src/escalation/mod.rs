//! Escalation Engine: Alert State Machine and Level Traversal
//!
//! Decides who gets paged, in what order, and when the next person gets
//! paged. Pure transitions live in [`state`]; [`engine`] performs the I/O
//! around them.
//!
//! # State Machine
//!
//! ```text
//! Healthy (no record / restored)
//!     │
//!     ├─ AlertReceived, level 1 exists → page L1, arm timeout
//!     ├─ AlertReceived, no level 1     → stay Healthy (nothing to page)
//!     │
//!     ▼
//! AwaitingAck(n)
//!     │
//!     ├─ AlertReceived (repeat)        → ignored
//!     ├─ Acknowledged                  → Acknowledged(n), timer cancelled
//!     ├─ Timeout, level n+1 exists     → page L(n+1), arm timeout → AwaitingAck(n+1)
//!     ├─ Timeout, no level n+1         → TimedOut(n), policy exhausted
//!     │
//!     ▼
//! Acknowledged(n)
//!     │
//!     ├─ Timeout / AlertReceived       → ignored (a human is engaged)
//!     │
//!     ▼
//! MarkedHealthy (from any state)       → Healthy, level back to 0
//! ```

pub mod dispatch;
pub mod engine;
pub mod locks;
pub mod state;

pub use dispatch::{DeliveryFailure, DeliveryReport, DispatchMode, Dispatcher};
pub use engine::{EngineConfig, EscalationEngine, EscalationOutcome, SharedEscalationEngine};
pub use locks::AlertLocks;
pub use state::{
    advance_decision, timeout_escalates, AdvanceDecision, AlertState, StatusChange, SuppressReason,
};
