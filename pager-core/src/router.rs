//! Per-alert event routing
//!
//! Inbound events and fired timeouts arrive on many tasks. The router gives
//! every alert its own FIFO queue drained by one worker, so events for one
//! alert are handled strictly in the order they were routed while different
//! alerts proceed in parallel. A worker that finds its queue empty removes
//! itself, so only alerts with pending work hold a queue.

use futures::future::join_all;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::alert::AlertKey;
use crate::escalation::SharedEscalationEngine;
use crate::events::EngineEvent;

/// Shared reference to an EventRouter
pub type SharedEventRouter = Arc<EventRouter>;

struct Worker {
    id: u64,
    sender: mpsc::UnboundedSender<EngineEvent>,
    handle: JoinHandle<()>,
}

type WorkerMap = Arc<Mutex<HashMap<AlertKey, Worker>>>;

fn lock_workers(
    workers: &Mutex<HashMap<AlertKey, Worker>>,
) -> MutexGuard<'_, HashMap<AlertKey, Worker>> {
    workers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Take the next queued event, or retire the worker once its queue is empty.
///
/// The emptiness check is repeated under the map lock. `route` sends while
/// holding the same lock, so no event can land in a queue whose worker has
/// already decided to exit.
fn next_event(
    receiver: &mut mpsc::UnboundedReceiver<EngineEvent>,
    workers: &Mutex<HashMap<AlertKey, Worker>>,
    key: &AlertKey,
    id: u64,
) -> Option<EngineEvent> {
    match receiver.try_recv() {
        Ok(event) => return Some(event),
        Err(TryRecvError::Disconnected) => return None,
        Err(TryRecvError::Empty) => {}
    }

    let mut workers = lock_workers(workers);
    match receiver.try_recv() {
        Ok(event) => Some(event),
        Err(_) => {
            if workers.get(key).map(|w| w.id) == Some(id) {
                workers.remove(key);
                debug!(alert = %key, "Alert queue idle, worker retired");
            }
            None
        }
    }
}

/// Ordered per-alert dispatch into the engine
pub struct EventRouter {
    engine: SharedEscalationEngine,
    workers: WorkerMap,
    next_worker: AtomicU64,
}

impl EventRouter {
    pub fn new(engine: SharedEscalationEngine) -> Self {
        Self {
            engine,
            workers: Arc::new(Mutex::new(HashMap::new())),
            next_worker: AtomicU64::new(0),
        }
    }

    /// Create a shared reference to this router
    pub fn shared(self) -> SharedEventRouter {
        Arc::new(self)
    }

    /// Queue an event behind any earlier events for the same alert
    pub fn route(&self, event: EngineEvent) {
        let key = event.key();
        let mut workers = lock_workers(&self.workers);

        let event = match workers.get(&key) {
            Some(worker) => match worker.sender.send(event) {
                Ok(()) => return,
                Err(mpsc::error::SendError(event)) => event,
            },
            None => event,
        };

        let worker = self.spawn_worker(key.clone());
        // The worker cannot retire before this send: it needs the map lock to do so.
        let _ = worker.sender.send(event);
        workers.insert(key, worker);
    }

    /// Forward fired timeouts from a scheduler channel until it closes
    pub fn forward(
        self: &Arc<Self>,
        mut timeouts: mpsc::UnboundedReceiver<EngineEvent>,
    ) -> JoinHandle<()> {
        let router = self.clone();
        tokio::spawn(async move {
            while let Some(event) = timeouts.recv().await {
                router.route(event);
            }
            debug!("Timeout channel closed");
        })
    }

    /// Number of alerts with a live queue
    pub fn queue_count(&self) -> usize {
        lock_workers(&self.workers).len()
    }

    /// Close every queue and wait for already-routed events to finish
    pub async fn drain(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut workers = lock_workers(&self.workers);
            workers.drain().map(|(_, worker)| worker.handle).collect()
        };

        for result in join_all(handles).await {
            if let Err(e) = result {
                warn!(error = %e, "Alert worker terminated abnormally");
            }
        }
    }

    fn spawn_worker(&self, key: AlertKey) -> Worker {
        let (sender, mut receiver) = mpsc::unbounded_channel::<EngineEvent>();
        let engine = self.engine.clone();
        let workers = self.workers.clone();
        let id = self.next_worker.fetch_add(1, Ordering::Relaxed);

        let handle = tokio::spawn(async move {
            while let Some(event) = next_event(&mut receiver, &workers, &key, id) {
                match engine.handle(&event).await {
                    Ok(outcome) => {
                        debug!(alert = %key, event = event.event_type(), ?outcome, "Event handled")
                    }
                    Err(e) => warn!(
                        alert = %key,
                        event = event.event_type(),
                        code = e.code(),
                        error = %e,
                        "Event processing failed"
                    ),
                }
            }
        });

        Worker { id, sender, handle }
    }
}
