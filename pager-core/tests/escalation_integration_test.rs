//! Integration tests for the Escalation Engine
//!
//! Drives the engine through its public surface with recording
//! collaborators, covering the paging scenarios and the state-machine
//! guarantees (monotonic escalation, acknowledgement suppression, healthy
//! reset, idempotent exhaustion).

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use pager_core::escalation::{EngineConfig, SuppressReason};
use pager_core::{
    Alert, AlertKey, AlertState, AlertStatus, Channel, DeliveryError, DispatchMode,
    EscalationEngine, EscalationLevel, EscalationOutcome, EscalationPolicy, EventBus,
    HealthStatus, MemoryStatusStore, PagerError, PagerEvent, StaticPolicySource, StatusStore,
    StoreError, StoreResult, Target, TimeoutScheduler,
};

// ── Recording collaborators ───────────────────────────────────────────────────

/// Shared log of target values in the order they were paged
type PageLog = Arc<Mutex<Vec<String>>>;

struct RecordingTarget {
    channel: Channel,
    value: String,
    fail: bool,
    log: PageLog,
    sends: AtomicUsize,
}

impl RecordingTarget {
    fn new(channel: Channel, value: &str, log: &PageLog) -> Arc<Self> {
        Arc::new(Self {
            channel,
            value: value.to_string(),
            fail: false,
            log: log.clone(),
            sends: AtomicUsize::new(0),
        })
    }

    fn failing(channel: Channel, value: &str, log: &PageLog) -> Arc<Self> {
        Arc::new(Self {
            channel,
            value: value.to_string(),
            fail: true,
            log: log.clone(),
            sends: AtomicUsize::new(0),
        })
    }

    fn sends(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Target for RecordingTarget {
    fn channel(&self) -> Channel {
        self.channel
    }

    fn value(&self) -> &str {
        &self.value
    }

    async fn send(&self, _alert: &Alert) -> Result<(), DeliveryError> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        self.log.lock().unwrap().push(self.value.clone());
        if self.fail {
            return Err(DeliveryError::Rejected {
                channel: self.channel,
                destination: self.value.clone(),
                reason: "rejected by test".into(),
            });
        }
        Ok(())
    }
}

#[derive(Default)]
struct RecordingScheduler {
    armed: Mutex<Vec<AlertKey>>,
    cancelled: Mutex<Vec<AlertKey>>,
}

impl RecordingScheduler {
    fn armed(&self) -> usize {
        self.armed.lock().unwrap().len()
    }
}

impl TimeoutScheduler for RecordingScheduler {
    fn arm(&self, alert: &Alert) {
        self.armed.lock().unwrap().push(alert.key());
    }

    fn cancel(&self, key: &AlertKey) {
        self.cancelled.lock().unwrap().push(key.clone());
    }
}

/// Memory store that counts writes and can be told to fail them
#[derive(Default)]
struct CountingStore {
    inner: MemoryStatusStore,
    creates: AtomicUsize,
    updates: AtomicUsize,
    fail_writes: bool,
}

impl CountingStore {
    fn seeded(status: AlertStatus) -> Self {
        Self {
            inner: MemoryStatusStore::with_records([status]),
            ..Default::default()
        }
    }

    fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatusStore for CountingStore {
    async fn get_status(&self, key: &AlertKey) -> StoreResult<Option<AlertStatus>> {
        self.inner.get_status(key).await
    }

    async fn create(&self, status: AlertStatus) -> StoreResult<AlertStatus> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes {
            return Err(StoreError::Unavailable("disk on fire".into()));
        }
        self.inner.create(status).await
    }

    async fn update(&self, status: &AlertStatus) -> StoreResult<()> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes {
            return Err(StoreError::Unavailable("disk on fire".into()));
        }
        self.inner.update(status).await
    }
}

// ── Fixtures ──────────────────────────────────────────────────────────────────

struct Harness {
    engine: EscalationEngine,
    store: Arc<CountingStore>,
    scheduler: Arc<RecordingScheduler>,
    log: PageLog,
}

impl Harness {
    fn pages(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    async fn status(&self, alert: &Alert) -> Option<AlertStatus> {
        self.store.get_status(&alert.key()).await.unwrap()
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn harness(
    service: &str,
    levels: Vec<EscalationLevel>,
    store: CountingStore,
    log: PageLog,
    config: EngineConfig,
) -> Harness {
    init_tracing();
    let policies = StaticPolicySource::new().with_policy(EscalationPolicy::new(service, levels));
    let store = Arc::new(store);
    let scheduler = Arc::new(RecordingScheduler::default());
    let engine =
        EscalationEngine::with_config(Arc::new(policies), store.clone(), scheduler.clone(), config);
    Harness {
        engine,
        store,
        scheduler,
        log,
    }
}

fn alert1() -> Alert {
    Alert::with_id("alert1", "service1", "I'm in trouble")
}

/// Status record for `alert` in an unhealthy episode at `level`
fn unhealthy_status(alert: &Alert, level: u32, acknowledged: bool, timeout: bool) -> AlertStatus {
    let mut status = AlertStatus::new(alert);
    status.status = HealthStatus::Unhealthy;
    status.current_level = level;
    status.acknowledged = acknowledged;
    status.timeout = timeout;
    status
}

/// Two-level policy: mail e@email.com at L1, SMS +34111222333 at L2
struct TwoLevels {
    mail: Arc<RecordingTarget>,
    sms: Arc<RecordingTarget>,
    log: PageLog,
}

impl TwoLevels {
    fn new() -> Self {
        let log = PageLog::default();
        Self {
            mail: RecordingTarget::new(Channel::Mail, "e@email.com", &log),
            sms: RecordingTarget::new(Channel::Sms, "+34111222333", &log),
            log,
        }
    }

    fn levels(&self) -> Vec<EscalationLevel> {
        vec![
            EscalationLevel::new(1, vec![self.mail.clone() as Arc<dyn Target>]),
            EscalationLevel::new(2, vec![self.sms.clone() as Arc<dyn Target>]),
        ]
    }

    fn harness(&self, store: CountingStore) -> Harness {
        harness(
            "service1",
            self.levels(),
            store,
            self.log.clone(),
            EngineConfig::default(),
        )
    }
}

// ── Paging scenarios ──────────────────────────────────────────────────────────

/// Healthy service receives an alert: first level paged, one timeout armed
#[tokio::test]
async fn test_first_alert_pages_level_one() {
    let policy = TwoLevels::new();
    let h = policy.harness(CountingStore::default());
    let alert = alert1();

    let outcome = h.engine.alert_received(&alert).await.unwrap();

    assert_eq!(outcome, EscalationOutcome::Notified { level: 1, targets: 1 });
    let status = h.status(&alert).await.unwrap();
    assert_eq!(status.status, HealthStatus::Unhealthy);
    assert_eq!(status.current_level, 1);
    assert_eq!(policy.mail.sends(), 1);
    assert_eq!(policy.sms.sends(), 0);
    assert_eq!(h.scheduler.armed(), 1);
}

/// No level 1 configured: nothing paged, no record created
#[tokio::test]
async fn test_first_alert_without_policy_levels_is_noop() {
    let log = PageLog::default();
    let h = harness(
        "service1",
        vec![],
        CountingStore::default(),
        log,
        EngineConfig::default(),
    );
    let alert = alert1();

    let outcome = h.engine.alert_received(&alert).await.unwrap();

    assert_eq!(outcome, EscalationOutcome::Exhausted { last_level: 0 });
    assert!(h.status(&alert).await.is_none());
    assert_eq!(h.store.creates(), 0);
    assert_eq!(h.store.updates(), 0);
    assert!(h.pages().is_empty());
    assert_eq!(h.scheduler.armed(), 0);
}

/// Unacknowledged level-1 page times out: level 2 paged, mail not re-paged
#[tokio::test]
async fn test_timeout_escalates_to_next_level() {
    let policy = TwoLevels::new();
    let alert = alert1();
    let h = policy.harness(CountingStore::seeded(unhealthy_status(&alert, 1, false, true)));

    let outcome = h.engine.acknowledge_timeout(&alert).await.unwrap();

    assert_eq!(outcome, EscalationOutcome::Notified { level: 2, targets: 1 });
    assert_eq!(policy.sms.sends(), 1);
    assert_eq!(policy.mail.sends(), 0);
    assert_eq!(h.scheduler.armed(), 1);
    assert_eq!(h.store.creates(), 0);

    let status = h.status(&alert).await.unwrap();
    assert_eq!(status.current_level, 2);
    assert!(!status.timeout, "a new level starts a fresh window");
}

/// Already-acknowledged alert: acknowledging again and a late timeout do nothing
#[tokio::test]
async fn test_acknowledged_alert_ignores_timeout() {
    let policy = TwoLevels::new();
    let alert = alert1();
    let h = policy.harness(CountingStore::seeded(unhealthy_status(&alert, 1, true, true)));

    let ack = h.engine.alert_acknowledged(&alert).await.unwrap();
    let timeout = h.engine.acknowledge_timeout(&alert).await.unwrap();

    assert_eq!(ack, EscalationOutcome::Acknowledged { level: 1 });
    assert_eq!(
        timeout,
        EscalationOutcome::Unchanged {
            state: AlertState::Acknowledged(1)
        }
    );
    assert!(h.pages().is_empty());
    assert_eq!(h.scheduler.armed(), 0);
    assert_eq!(h.store.updates(), 0);
    assert!(h.status(&alert).await.unwrap().acknowledged);
}

/// Acknowledgement is written exactly once and the pending timer is cancelled
#[tokio::test]
async fn test_acknowledgement_recorded_once() {
    let policy = TwoLevels::new();
    let alert = alert1();
    let h = policy.harness(CountingStore::seeded(unhealthy_status(&alert, 1, false, false)));

    h.engine.alert_acknowledged(&alert).await.unwrap();
    h.engine.alert_acknowledged(&alert).await.unwrap();
    h.engine.acknowledge_timeout(&alert).await.unwrap();

    assert_eq!(h.store.updates(), 1);
    assert_eq!(h.scheduler.cancelled.lock().unwrap().len(), 1);
    assert_eq!(h.scheduler.armed(), 0);
    assert!(h.pages().is_empty());
}

/// Repeat report while the current window is still open: nothing paged
#[tokio::test]
async fn test_repeat_report_before_timeout_is_suppressed() {
    let policy = TwoLevels::new();
    let alert = alert1();
    let h = policy.harness(CountingStore::seeded(unhealthy_status(&alert, 1, false, false)));

    let outcome = h.engine.alert_received(&alert).await.unwrap();

    assert_eq!(
        outcome,
        EscalationOutcome::Suppressed {
            reason: SuppressReason::AwaitingAck
        }
    );
    assert!(h.pages().is_empty());
    assert_eq!(h.scheduler.armed(), 0);
    assert_eq!(h.store.updates(), 0);
}

/// Repeat report after an unacknowledged timeout pages the next level
#[tokio::test]
async fn test_repeat_report_after_timeout_escalates() {
    let policy = TwoLevels::new();
    let alert = alert1();
    let h = policy.harness(CountingStore::seeded(unhealthy_status(&alert, 1, false, true)));

    let outcome = h.engine.alert_received(&alert).await.unwrap();

    assert_eq!(outcome, EscalationOutcome::Notified { level: 2, targets: 1 });
    assert_eq!(h.pages(), vec!["+34111222333"]);
}

/// Marked healthy, then a stale timeout fires: no page, no timer
#[tokio::test]
async fn test_timeout_after_healthy_is_ignored() {
    let policy = TwoLevels::new();
    let alert = alert1();
    let h = policy.harness(CountingStore::seeded(unhealthy_status(&alert, 1, false, false)));

    let healthy = h.engine.mark_healthy(&alert).await.unwrap();
    let timeout = h.engine.acknowledge_timeout(&alert).await.unwrap();

    assert_eq!(healthy, EscalationOutcome::Healthy);
    assert_eq!(
        timeout,
        EscalationOutcome::Unchanged {
            state: AlertState::Healthy
        }
    );
    assert!(h.pages().is_empty());
    assert_eq!(h.scheduler.armed(), 0);

    let status = h.status(&alert).await.unwrap();
    assert_eq!(status.status, HealthStatus::Healthy);
    assert_eq!(status.current_level, 0);
}

/// A timeout on a record already reported healthy does nothing either
#[tokio::test]
async fn test_timeout_on_healthy_record_is_ignored() {
    let policy = TwoLevels::new();
    let alert = alert1();
    let h = policy.harness(CountingStore::seeded(AlertStatus::new(&alert)));

    let outcome = h.engine.acknowledge_timeout(&alert).await.unwrap();

    assert!(matches!(outcome, EscalationOutcome::Unchanged { .. }));
    assert!(h.pages().is_empty());
    assert_eq!(h.scheduler.armed(), 0);
}

// ── State-machine guarantees ──────────────────────────────────────────────────

/// Every escalation step moves exactly one level forward
#[tokio::test]
async fn test_escalation_is_monotonic() {
    let log = PageLog::default();
    let targets: Vec<_> = (1..=5)
        .map(|n| RecordingTarget::new(Channel::Mail, &format!("level{n}@oncall"), &log))
        .collect();
    let levels = targets
        .iter()
        .enumerate()
        .map(|(i, t)| EscalationLevel::new(i as u32 + 1, vec![t.clone() as Arc<dyn Target>]))
        .collect();
    let h = harness(
        "service1",
        levels,
        CountingStore::default(),
        log,
        EngineConfig::default(),
    );
    let alert = alert1();

    h.engine.alert_received(&alert).await.unwrap();
    for expected in 2..=5 {
        let outcome = h.engine.acknowledge_timeout(&alert).await.unwrap();
        assert_eq!(
            outcome,
            EscalationOutcome::Notified {
                level: expected,
                targets: 1
            }
        );
        assert_eq!(h.status(&alert).await.unwrap().current_level, expected);
    }

    let outcome = h.engine.acknowledge_timeout(&alert).await.unwrap();
    assert_eq!(outcome, EscalationOutcome::Exhausted { last_level: 5 });

    let expected: Vec<String> = (1..=5).map(|n| format!("level{n}@oncall")).collect();
    assert_eq!(h.pages(), expected);
    assert_eq!(h.scheduler.armed(), 5);
}

/// Once exhausted, repeat reports never touch the record or page anyone
#[tokio::test]
async fn test_exhaustion_is_idempotent() {
    let policy = TwoLevels::new();
    let alert = alert1();
    let h = policy.harness(CountingStore::seeded(unhealthy_status(&alert, 2, false, true)));
    let before = h.status(&alert).await.unwrap();

    for _ in 0..5 {
        let outcome = h.engine.alert_received(&alert).await.unwrap();
        assert_eq!(outcome, EscalationOutcome::Exhausted { last_level: 2 });
    }

    assert_eq!(h.status(&alert).await.unwrap(), before);
    assert_eq!(h.store.updates(), 0);
    assert!(h.pages().is_empty());
    assert_eq!(h.scheduler.armed(), 0);
}

/// Acknowledgement suppresses every later page in the episode
#[tokio::test]
async fn test_acknowledgement_suppresses_renotification() {
    let policy = TwoLevels::new();
    let h = policy.harness(CountingStore::default());
    let alert = alert1();

    h.engine.alert_received(&alert).await.unwrap();
    h.engine.alert_acknowledged(&alert).await.unwrap();
    let timeout = h.engine.acknowledge_timeout(&alert).await.unwrap();
    let repeat = h.engine.alert_received(&alert).await.unwrap();

    assert!(matches!(timeout, EscalationOutcome::Unchanged { .. }));
    assert_eq!(
        repeat,
        EscalationOutcome::Suppressed {
            reason: SuppressReason::Acknowledged
        }
    );
    assert_eq!(h.pages(), vec!["e@email.com"]);
    assert_eq!(h.scheduler.armed(), 1);
}

/// After recovery the next report starts over at level 1
#[tokio::test]
async fn test_new_episode_after_healthy_restarts_at_level_one() {
    let policy = TwoLevels::new();
    let h = policy.harness(CountingStore::default());
    let alert = alert1();

    h.engine.alert_received(&alert).await.unwrap();
    h.engine.acknowledge_timeout(&alert).await.unwrap();
    h.engine.mark_healthy(&alert).await.unwrap();
    let outcome = h.engine.alert_received(&alert).await.unwrap();

    assert_eq!(outcome, EscalationOutcome::Notified { level: 1, targets: 1 });
    assert_eq!(h.pages(), vec!["e@email.com", "+34111222333", "e@email.com"]);
    assert_eq!(h.store.creates(), 1);
}

// ── Error handling ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_events_without_prior_alert_fail_precondition() {
    let policy = TwoLevels::new();
    let h = policy.harness(CountingStore::default());
    let alert = alert1();

    let timeout = h.engine.acknowledge_timeout(&alert).await.unwrap_err();
    let ack = h.engine.alert_acknowledged(&alert).await.unwrap_err();
    let healthy = h.engine.mark_healthy(&alert).await.unwrap_err();

    for err in [&timeout, &ack, &healthy] {
        assert!(matches!(err, PagerError::PreconditionFailed { .. }), "{err}");
    }
    assert!(matches!(
        timeout,
        PagerError::PreconditionFailed {
            event: "acknowledge_timeout",
            ..
        }
    ));
    assert!(h.status(&alert).await.is_none());
    assert_eq!(h.store.creates(), 0);
}

/// Default dispatch pages every target and reports every failure
#[tokio::test]
async fn test_delivery_failures_collected_and_propagated() {
    let log = PageLog::default();
    let broken = RecordingTarget::failing(Channel::Mail, "broken@email.com", &log);
    let sms = RecordingTarget::new(Channel::Sms, "+34111222333", &log);
    let h = harness(
        "service1",
        vec![EscalationLevel::new(
            1,
            vec![broken.clone() as Arc<dyn Target>, sms.clone()],
        )],
        CountingStore::default(),
        log,
        EngineConfig::default(),
    );
    let alert = alert1();

    let err = h.engine.alert_received(&alert).await.unwrap_err();

    let PagerError::Delivery(report) = err else {
        panic!("expected delivery error");
    };
    assert_eq!(report.attempted, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].target, "broken@email.com");
    assert_eq!(sms.sends(), 1);
    assert_eq!(h.scheduler.armed(), 1);
    assert_eq!(h.status(&alert).await.unwrap().current_level, 1);
}

#[tokio::test]
async fn test_fail_fast_skips_remaining_targets() {
    let log = PageLog::default();
    let broken = RecordingTarget::failing(Channel::Mail, "broken@email.com", &log);
    let sms = RecordingTarget::new(Channel::Sms, "+34111222333", &log);
    let h = harness(
        "service1",
        vec![EscalationLevel::new(
            1,
            vec![broken.clone() as Arc<dyn Target>, sms.clone()],
        )],
        CountingStore::default(),
        log,
        EngineConfig {
            dispatch_mode: DispatchMode::FailFast,
        },
    );

    let err = h.engine.alert_received(&alert1()).await.unwrap_err();

    assert!(matches!(err, PagerError::Delivery(ref r) if r.skipped == 1));
    assert_eq!(broken.sends(), 1);
    assert_eq!(sms.sends(), 0);
}

/// A failed status write aborts before anyone is paged
#[tokio::test]
async fn test_store_failure_propagates_before_paging() {
    let policy = TwoLevels::new();
    let store = CountingStore {
        fail_writes: true,
        ..Default::default()
    };
    let h = policy.harness(store);
    let alert = alert1();

    let err = h.engine.alert_received(&alert).await.unwrap_err();

    assert!(matches!(err, PagerError::Store(StoreError::Unavailable(_))));
    assert!(h.pages().is_empty());
    assert_eq!(h.scheduler.armed(), 0);
    assert!(h.status(&alert).await.is_none());
}

/// A first report is stored in one write, already at level 1
#[tokio::test]
async fn test_first_report_written_once() {
    let policy = TwoLevels::new();
    let h = policy.harness(CountingStore::default());
    let alert = alert1();

    h.engine.alert_received(&alert).await.unwrap();

    assert_eq!(h.store.creates(), 1);
    assert_eq!(h.store.updates(), 0);
    let status = h.status(&alert).await.unwrap();
    assert_eq!(status.current_level, 1);
    assert!(status.last_notified_at.is_some());
}

/// A level numbered `u32::MAX` is the end of the policy, never an overflow
#[tokio::test]
async fn test_timeout_at_max_level_reports_exhaustion() {
    let log = PageLog::default();
    let last = RecordingTarget::new(Channel::Mail, "last@oncall", &log);
    let alert = alert1();
    let h = harness(
        "service1",
        vec![EscalationLevel::new(u32::MAX, vec![last.clone() as Arc<dyn Target>])],
        CountingStore::seeded(unhealthy_status(&alert, u32::MAX, false, false)),
        log,
        EngineConfig::default(),
    );

    let timeout = h.engine.acknowledge_timeout(&alert).await.unwrap();
    let repeat = h.engine.alert_received(&alert).await.unwrap();

    let exhausted = EscalationOutcome::Exhausted {
        last_level: u32::MAX,
    };
    assert_eq!(timeout, exhausted);
    assert_eq!(repeat, exhausted);
    assert_eq!(last.sends(), 0);
    assert_eq!(h.scheduler.armed(), 0);
    assert_eq!(h.status(&alert).await.unwrap().current_level, u32::MAX);
}

// ── Concurrency and observability ─────────────────────────────────────────────

/// Concurrent duplicate reports for one alert page the level exactly once
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reports_serialized_per_alert() {
    let policy = TwoLevels::new();
    let h = Arc::new(policy.harness(CountingStore::default()));
    let alert = alert1();

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let h = h.clone();
            let alert = alert.clone();
            tokio::spawn(async move { h.engine.alert_received(&alert).await.unwrap() })
        })
        .collect();

    let mut notified = 0;
    for task in tasks {
        if let EscalationOutcome::Notified { .. } = task.await.unwrap() {
            notified += 1;
        }
    }

    assert_eq!(notified, 1);
    assert_eq!(policy.mail.sends(), 1);
    assert_eq!(h.store.creates(), 1);
    assert_eq!(h.scheduler.armed(), 1);
}

#[tokio::test]
async fn test_decisions_published_on_event_bus() {
    let policy = TwoLevels::new();
    let policies =
        StaticPolicySource::new().with_policy(EscalationPolicy::new("service1", policy.levels()));
    let bus = EventBus::new().shared();
    let mut events = bus.subscribe();
    let engine = EscalationEngine::new(
        Arc::new(policies),
        Arc::new(MemoryStatusStore::new()),
        Arc::new(RecordingScheduler::default()),
    )
    .with_event_bus(bus.clone());
    let alert = alert1();

    engine.alert_received(&alert).await.unwrap();
    engine.acknowledge_timeout(&alert).await.unwrap();
    engine.acknowledge_timeout(&alert).await.unwrap();
    engine.mark_healthy(&alert).await.unwrap();

    let mut types = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let PagerEvent::LevelNotified { level, targets, .. } = &event {
            assert_eq!(targets.len(), 1);
            assert!(*level <= 2);
        }
        types.push(event.event_type());
    }
    assert_eq!(
        types,
        vec![
            "level_notified",
            "timeout_fired",
            "level_notified",
            "timeout_fired",
            "policy_exhausted",
            "marked_healthy",
        ]
    );
}
