//! Daemon wiring and the stdin/stdout event loop

use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use pager_core::{
    ConfigError, EscalationEngine, EventBus, EventRouter, JsonFileStatusStore, MemoryStatusStore,
    PagerConfig, PagerEvent, PolicyError, SharedEventRouter, SharedStatusStore,
    StaticPolicySource, StoreError, TokioTimeoutScheduler, TransportTargetFactory,
};

use crate::input::parse_line;

/// Errors that prevent the daemon from starting
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("policy: {0}")]
    Policy(#[from] PolicyError),

    #[error("status store: {0}")]
    Store(#[from] StoreError),
}

/// Line counts from one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Lines routed to the engine
    pub routed: usize,
    /// Lines rejected as malformed
    pub rejected: usize,
    /// Pager events written to the output
    pub published: usize,
}

/// A running engine with its router, timeout forwarder and event output
pub struct Daemon {
    router: SharedEventRouter,
    forwarder: JoinHandle<()>,
    output: Option<mpsc::UnboundedReceiver<PagerEvent>>,
}

impl Daemon {
    /// Build every component from config. Must be called inside a runtime.
    pub fn start(config: &PagerConfig) -> Result<Self, StartupError> {
        let policy_path = config.require_policy_path()?;
        let policies = StaticPolicySource::load(policy_path, &TransportTargetFactory::logging())?;
        info!(
            path = %policy_path.display(),
            services = policies.service_count(),
            "Loaded escalation policy"
        );

        let store: SharedStatusStore = match &config.state_path {
            Some(path) => {
                info!(path = %path.display(), "Using JSON status store");
                Arc::new(JsonFileStatusStore::open(path)?)
            }
            None => {
                warn!("No state path configured, alert status will not survive a restart");
                Arc::new(MemoryStatusStore::new())
            }
        };

        let (scheduler, timeouts) = TokioTimeoutScheduler::channel(config.ack_timeout);
        // Output goes through an unbounded sink; a broadcast subscriber would drop
        // events whenever a burst outruns the writer.
        let (sink, output) = mpsc::unbounded_channel();
        let bus = EventBus::new().with_sink(sink).shared();
        let engine = EscalationEngine::with_config(
            Arc::new(policies),
            store,
            Arc::new(scheduler),
            config.engine_config(),
        )
        .with_event_bus(bus)
        .shared();

        let router = EventRouter::new(engine).shared();
        let forwarder = router.forward(timeouts);

        info!(
            ack_timeout_secs = config.ack_timeout.as_secs(),
            dispatch_mode = ?config.dispatch_mode,
            "Pager daemon started"
        );

        Ok(Self {
            router,
            forwarder,
            output: Some(output),
        })
    }

    /// Take the stream of every event the engine publishes
    pub fn take_output(&mut self) -> Option<mpsc::UnboundedReceiver<PagerEvent>> {
        self.output.take()
    }

    /// Parse and route one input line; returns whether it was accepted
    pub fn submit(&self, line: &str) -> bool {
        match parse_line(line) {
            Ok(Some(event)) => {
                debug!(alert = %event.key(), event = event.event_type(), "Routing event");
                self.router.route(event);
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, line = line.trim(), "Rejected input line");
                false
            }
        }
    }

    /// Stop accepting timeouts and finish every queued event.
    /// Timers still pending are abandoned.
    pub async fn shutdown(self) {
        self.forwarder.abort();
        self.router.drain().await;
        info!("Pager daemon stopped");
    }
}

/// Feed `input` to the daemon until it closes, writing pager events to `output`
pub async fn run<R, W>(
    mut daemon: Daemon,
    input: R,
    output: &mut W,
) -> anyhow::Result<RunSummary>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let events = daemon
        .take_output()
        .ok_or_else(|| anyhow::anyhow!("daemon output already taken"))?;
    let (stop_tx, stop_rx) = oneshot::channel();

    let reader = async move {
        let mut lines = input.lines();
        let mut summary = RunSummary::default();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            if daemon.submit(&line) {
                summary.routed += 1;
            } else {
                summary.rejected += 1;
            }
        }

        debug!("Input closed, draining queues");
        daemon.shutdown().await;
        let _ = stop_tx.send(());
        Ok::<_, std::io::Error>(summary)
    };

    let (summary, published) = tokio::join!(reader, write_events(events, stop_rx, output));
    let mut summary = summary?;
    summary.published = published?;
    Ok(summary)
}

/// Write events as JSON lines until stopped, then flush what is buffered.
/// Every event is published before the router drain that precedes `stop`
/// returns, so the final `try_recv` pass sees all of them.
async fn write_events<W: AsyncWrite + Unpin>(
    mut events: mpsc::UnboundedReceiver<PagerEvent>,
    mut stop: oneshot::Receiver<()>,
    output: &mut W,
) -> std::io::Result<usize> {
    let mut written = 0;

    loop {
        tokio::select! {
            biased;
            received = events.recv() => match received {
                Some(event) => {
                    write_event(output, &event).await?;
                    written += 1;
                }
                None => break,
            },
            _ = &mut stop => {
                while let Ok(event) = events.try_recv() {
                    write_event(output, &event).await?;
                    written += 1;
                }
                break;
            }
        }
    }

    output.flush().await?;
    Ok(written)
}

async fn write_event<W: AsyncWrite + Unpin>(
    output: &mut W,
    event: &PagerEvent,
) -> std::io::Result<()> {
    let mut line = serde_json::to_vec(event)?;
    line.push(b'\n');
    output.write_all(&line).await
}
