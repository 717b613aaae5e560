//! Event bus for pager decisions
//!
//! Tokio broadcast channel carrying [`PagerEvent`]s. Publishing never blocks
//! the engine; a bus with no subscribers simply drops the event. Broadcast
//! subscribers that fall more than [`CHANNEL_CAPACITY`] events behind lose
//! the oldest ones, so consumers that must see every event attach a sink
//! instead.

use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

use super::types::PagerEvent;

/// Channel capacity for broadcast
pub const CHANNEL_CAPACITY: usize = 256;

/// Shared reference to EventBus
pub type SharedEventBus = Arc<EventBus>;

/// Broadcast bus for pager events
pub struct EventBus {
    sender: broadcast::Sender<PagerEvent>,
    sinks: Vec<mpsc::UnboundedSender<PagerEvent>>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            sinks: Vec::new(),
        }
    }

    /// Attach an unbounded sink that receives every published event
    pub fn with_sink(mut self, sink: mpsc::UnboundedSender<PagerEvent>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Create a shared reference to this event bus
    pub fn shared(self) -> SharedEventBus {
        Arc::new(self)
    }

    /// Publish an event to every sink and all subscribers
    pub fn publish(&self, event: PagerEvent) {
        let event_type = event.event_type();
        for sink in &self.sinks {
            if sink.send(event.clone()).is_err() {
                warn!(event_type, "Event sink closed");
            }
        }
        match self.sender.send(event) {
            Ok(count) => debug!(event_type, receivers = count, "Event published"),
            Err(_) => debug!(event_type, "Event published (no receivers)"),
        }
    }

    /// Subscribe to receive events
    pub fn subscribe(&self) -> broadcast::Receiver<PagerEvent> {
        self.sender.subscribe()
    }

    /// Get the number of current subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
