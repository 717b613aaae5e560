//! Acknowledgement timeout scheduling
//!
//! The engine never polls. After notifying a level it arms one timer for the
//! alert; when the timer elapses an [`EngineEvent::AcknowledgeTimeoutFired`]
//! is delivered back to whoever drains the scheduler's channel. Re-arming an
//! alert supersedes its pending timer, so one alert never has two timeouts
//! in flight.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, warn};

use crate::alert::{Alert, AlertKey};
use crate::events::EngineEvent;

/// Default acknowledgement window
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// Trait for the timer collaborator
pub trait TimeoutScheduler: Send + Sync {
    /// Schedule an acknowledgement timeout, replacing any pending one
    fn arm(&self, alert: &Alert);

    /// Drop the pending timeout for an alert, if any
    fn cancel(&self, key: &AlertKey);
}

struct PendingTimer {
    generation: u64,
    handle: AbortHandle,
}

type PendingMap = Arc<Mutex<HashMap<AlertKey, PendingTimer>>>;

fn lock_pending(
    pending: &Mutex<HashMap<AlertKey, PendingTimer>>,
) -> MutexGuard<'_, HashMap<AlertKey, PendingTimer>> {
    pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Scheduler backed by one tokio sleep task per alert
pub struct TokioTimeoutScheduler {
    delay: Duration,
    sender: mpsc::UnboundedSender<EngineEvent>,
    pending: PendingMap,
    next_generation: AtomicU64,
}

impl TokioTimeoutScheduler {
    pub fn new(delay: Duration, sender: mpsc::UnboundedSender<EngineEvent>) -> Self {
        Self {
            delay,
            sender,
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(0),
        }
    }

    /// Create a scheduler together with the receiver its timeouts arrive on
    pub fn channel(delay: Duration) -> (Self, mpsc::UnboundedReceiver<EngineEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(delay, sender), receiver)
    }

    /// Number of timers currently waiting to fire
    pub fn pending_count(&self) -> usize {
        lock_pending(&self.pending).len()
    }
}

impl TimeoutScheduler for TokioTimeoutScheduler {
    fn arm(&self, alert: &Alert) {
        let key = alert.key();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);

        // Hold the map while spawning so the task cannot finish before it is registered.
        let mut pending = lock_pending(&self.pending);

        let task = {
            let pending = self.pending.clone();
            let sender = self.sender.clone();
            let delay = self.delay;
            let alert = alert.clone();
            let key = key.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                {
                    let mut pending = lock_pending(&pending);
                    if pending.get(&key).map(|t| t.generation) != Some(generation) {
                        // Superseded or cancelled while waking up.
                        return;
                    }
                    pending.remove(&key);
                }
                debug!(alert = %key, "Acknowledgement timeout fired");
                if sender
                    .send(EngineEvent::AcknowledgeTimeoutFired { alert })
                    .is_err()
                {
                    warn!(alert = %key, "Timeout fired after the engine stopped listening");
                }
            })
        };

        let timer = PendingTimer {
            generation,
            handle: task.abort_handle(),
        };
        if let Some(previous) = pending.insert(key.clone(), timer) {
            previous.handle.abort();
            debug!(alert = %key, "Superseded pending acknowledgement timeout");
        }
        debug!(alert = %key, delay_secs = self.delay.as_secs(), "Armed acknowledgement timeout");
    }

    fn cancel(&self, key: &AlertKey) {
        if let Some(timer) = lock_pending(&self.pending).remove(key) {
            timer.handle.abort();
            debug!(alert = %key, "Cancelled acknowledgement timeout");
        }
    }
}
