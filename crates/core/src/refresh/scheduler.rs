use std::{sync::Arc, time::Duration};

use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio::{
    sync::mpsc,
    time::{sleep_until, timeout, Instant},
};
use tracing::{debug, info, warn};

use super::policy::{Backoff, RefreshPolicy};
use crate::{
    api::DataSource,
    error::FetchError,
    models::{Envelope, StatusResponse},
    snapshot::{GateOutcome, HashGate, SnapshotCache},
    time::TimeSource,
};

/// Requests accepted by a running scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshCommand {
    /// User-triggered refresh.
    Manual,
    /// Banners reached their end; fresh data is likely available.
    Expired {
        /// Ids of the banners that just finished.
        banner_ids: Vec<String>,
    },
    /// Stop the scheduler loop.
    Shutdown,
}

/// What started an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTrigger {
    /// Timer derived from `next_refresh_at`, or a backoff retry.
    Scheduled,
    /// User request.
    Manual,
    /// A banner countdown reached zero.
    Expiry,
}

/// Phase of the refresh state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    /// Waiting for the next trigger.
    Idle,
    /// At least one attempt is in flight.
    Fetching,
    /// The last completed attempt went through the gate.
    Applied,
    /// The last completed attempt failed; a retry is armed.
    Failed,
}

/// Events emitted by the scheduler for the presentation layer.
#[derive(Debug)]
pub enum SyncEvent {
    /// An attempt was sent.
    Started {
        /// Sequence number of the attempt.
        attempt: u64,
        /// What caused it.
        trigger: RefreshTrigger,
    },
    /// An attempt completed and went through the hash gate.
    Applied {
        /// Sequence number of the attempt.
        attempt: u64,
        /// Whether the store was replaced.
        outcome: GateOutcome,
        /// Server time the payload was produced.
        fetched_at: DateTime<Utc>,
        /// Server hint for the next refresh.
        next_refresh_at: DateTime<Utc>,
    },
    /// A result arrived after a newer attempt had already been applied and was dropped.
    Superseded {
        /// Sequence number of the dropped attempt.
        attempt: u64,
    },
    /// An attempt failed; the previous snapshot is untouched.
    Failed {
        /// Sequence number of the attempt.
        attempt: u64,
        /// Why it failed.
        error: FetchError,
        /// Length of the current failure streak.
        consecutive_failures: u32,
        /// Delay before the retry, floor and jitter included.
        retry_in: Duration,
    },
    /// Consecutive failures crossed the degraded threshold. Retries continue.
    Degraded {
        /// Length of the failure streak that crossed the threshold.
        consecutive_failures: u32,
    },
    /// A success ended a degraded streak.
    Recovered,
    /// An out-of-band request arrived too soon after the previous attempt.
    CooldownActive {
        /// Time left until a new request is accepted.
        retry_after: Duration,
    },
}

/// Monotonic attempt numbering with last-completed, highest-sequence-wins admission.
#[derive(Debug, Default)]
pub struct AttemptSequencer {
    issued: u64,
    applied: u64,
}

impl AttemptSequencer {
    /// Allocate the next attempt number.
    pub fn begin(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    /// Whether a result of `attempt` may still be applied.
    pub fn is_current(&self, attempt: u64) -> bool {
        attempt > self.applied
    }

    /// Record `attempt` as applied. Returns `false` if a newer attempt already was.
    pub fn mark_applied(&mut self, attempt: u64) -> bool {
        if !self.is_current(attempt) {
            return false;
        }
        self.applied = attempt;
        true
    }

    /// Highest attempt applied so far, `0` before the first.
    pub fn last_applied(&self) -> u64 {
        self.applied
    }
}

enum Payload {
    Envelope(Envelope),
    Status(StatusResponse),
}

impl Payload {
    fn validate(&self) -> Result<(), FetchError> {
        match self {
            Payload::Envelope(envelope) => envelope.validate()?,
            Payload::Status(status) => status.validate()?,
        }
        Ok(())
    }
}

struct Completion {
    attempt: u64,
    result: Result<Payload, FetchError>,
}

/// Drives periodic fetches into the [`HashGate`].
pub struct RefreshScheduler {
    source: Arc<dyn DataSource>,
    gate: HashGate,
    clock: Arc<dyn TimeSource>,
    policy: RefreshPolicy,
    backoff: Backoff,
    cache: Option<SnapshotCache>,
    sequencer: AttemptSequencer,
    state: RefreshState,
    in_flight: usize,
    next_due: Option<Instant>,
    /// Trigger to report when `next_due` fires instead of `Scheduled`.
    deferred: Option<RefreshTrigger>,
    last_started: Option<Instant>,
    next_refresh_at: Option<DateTime<Utc>>,
}

impl RefreshScheduler {
    /// Scheduler feeding `gate` from `source`. Nothing runs until [`RefreshScheduler::run`].
    pub fn new(
        source: Arc<dyn DataSource>,
        gate: HashGate,
        clock: Arc<dyn TimeSource>,
        policy: RefreshPolicy,
        backoff: Backoff,
    ) -> Self {
        let next_refresh_at = gate
            .store()
            .current()
            .map(|envelope| envelope.next_refresh_at);
        Self {
            source,
            gate,
            clock,
            policy,
            backoff,
            cache: None,
            sequencer: AttemptSequencer::default(),
            state: RefreshState::Idle,
            in_flight: 0,
            next_due: None,
            deferred: None,
            last_started: None,
            next_refresh_at,
        }
    }

    /// Persist every changed snapshot to `cache`.
    pub fn with_cache(mut self, cache: SnapshotCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Current state machine phase.
    pub fn state(&self) -> RefreshState {
        self.state
    }

    /// Run until [`RefreshCommand::Shutdown`], the command channel closes, or the event receiver goes away.
    ///
    /// The first attempt is issued immediately.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<RefreshCommand>,
        events: mpsc::Sender<SyncEvent>,
    ) -> Result<()> {
        let (done_tx, mut done_rx) = mpsc::channel::<Completion>(16);
        self.next_due = Some(Instant::now());

        loop {
            if events.is_closed() {
                debug!("event receiver dropped; stopping scheduler");
                break;
            }

            tokio::select! {
                _ = wait_until(self.next_due) => {
                    self.next_due = None;
                    let trigger = self.deferred.take().unwrap_or(RefreshTrigger::Scheduled);
                    if self.in_flight == 0 {
                        self.start_attempt(trigger, &done_tx, &events).await;
                    } else {
                        debug!(in_flight = self.in_flight, "scheduled attempt skipped; fetch in flight");
                    }
                }
                command = commands.recv() => match command {
                    Some(RefreshCommand::Manual) => {
                        self.out_of_band(RefreshTrigger::Manual, &done_tx, &events).await;
                    }
                    Some(RefreshCommand::Expired { banner_ids }) => {
                        info!(banners = ?banner_ids, "banners expired; requesting refresh");
                        self.out_of_band(RefreshTrigger::Expiry, &done_tx, &events).await;
                    }
                    Some(RefreshCommand::Shutdown) | None => break,
                },
                Some(completion) = done_rx.recv() => {
                    self.complete(completion, &events).await;
                }
            }
        }

        info!("refresh scheduler stopped");
        Ok(())
    }

    async fn out_of_band(
        &mut self,
        trigger: RefreshTrigger,
        done_tx: &mpsc::Sender<Completion>,
        events: &mpsc::Sender<SyncEvent>,
    ) {
        if let Some(last) = self.last_started {
            let elapsed = last.elapsed();
            if elapsed < self.policy.manual_cooldown {
                let retry_after = self.policy.manual_cooldown - elapsed;
                debug!(?trigger, ?retry_after, "out-of-band refresh rejected by cooldown");
                if trigger == RefreshTrigger::Expiry {
                    // Expiry still deserves a fetch once the cooldown is over.
                    let at = last + self.policy.manual_cooldown;
                    self.next_due = Some(self.next_due.map_or(at, |due| due.min(at)));
                    self.deferred = Some(trigger);
                } else {
                    let _ = events.send(SyncEvent::CooldownActive { retry_after }).await;
                }
                return;
            }
        }
        self.start_attempt(trigger, done_tx, events).await;
    }

    async fn start_attempt(
        &mut self,
        trigger: RefreshTrigger,
        done_tx: &mpsc::Sender<Completion>,
        events: &mpsc::Sender<SyncEvent>,
    ) {
        let attempt = self.sequencer.begin();
        self.state = RefreshState::Fetching;
        self.in_flight += 1;
        self.next_due = None;
        self.deferred = None;
        self.last_started = Some(Instant::now());

        let known_hash = if trigger == RefreshTrigger::Scheduled && self.policy.probe_status {
            self.gate.last_hash().map(str::to_owned)
        } else {
            None
        };
        let source = Arc::clone(&self.source);
        let budget = self.policy.timeout;
        let done_tx = done_tx.clone();

        debug!(attempt, ?trigger, status_check = known_hash.is_some(), "starting fetch");
        tokio::spawn(async move {
            let result = match timeout(budget, fetch(source.as_ref(), known_hash)).await {
                Ok(result) => result,
                Err(_) => Err(FetchError::Timeout { timeout: budget }),
            };
            let _ = done_tx.send(Completion { attempt, result }).await;
        });

        let _ = events.send(SyncEvent::Started { attempt, trigger }).await;
    }

    async fn complete(&mut self, completion: Completion, events: &mpsc::Sender<SyncEvent>) {
        let Completion { attempt, result } = completion;
        self.in_flight = self.in_flight.saturating_sub(1);

        if !self.sequencer.is_current(attempt) {
            debug!(
                attempt,
                applied = self.sequencer.last_applied(),
                "discarding superseded result"
            );
            let _ = events.send(SyncEvent::Superseded { attempt }).await;
            if self.in_flight == 0 && self.next_due.is_none() {
                self.schedule_next();
            }
            return;
        }

        let result = result.and_then(|payload| payload.validate().map(|()| payload));
        match result {
            Ok(payload) => self.apply(attempt, payload, events).await,
            Err(error) => self.fail(attempt, error, events).await,
        }
    }

    async fn apply(&mut self, attempt: u64, payload: Payload, events: &mpsc::Sender<SyncEvent>) {
        self.sequencer.mark_applied(attempt);

        let (outcome, fetched_at, next_refresh_at) = match payload {
            Payload::Envelope(envelope) => {
                let fetched_at = envelope.fetched_at;
                let next_refresh_at = envelope.next_refresh_at;
                let hash = envelope.data_hash.clone();
                let outcome = self.gate.accept(&hash, envelope);
                if outcome == GateOutcome::Changed {
                    self.persist();
                }
                (outcome, fetched_at, next_refresh_at)
            }
            Payload::Status(status) => (
                GateOutcome::Unchanged,
                status.fetched_at,
                status.next_refresh_at,
            ),
        };

        self.state = RefreshState::Applied;
        info!(attempt, ?outcome, %next_refresh_at, "refresh applied");

        if self.backoff.reset() {
            info!("sync recovered after degraded streak");
            let _ = events.send(SyncEvent::Recovered).await;
        }
        let _ = events
            .send(SyncEvent::Applied {
                attempt,
                outcome,
                fetched_at,
                next_refresh_at,
            })
            .await;

        self.next_refresh_at = Some(next_refresh_at);
        self.schedule_next();
    }

    async fn fail(&mut self, attempt: u64, error: FetchError, events: &mpsc::Sender<SyncEvent>) {
        self.state = RefreshState::Failed;
        let retry_in = self.policy.retry_delay(self.backoff.record_failure());
        let consecutive_failures = self.backoff.consecutive_failures();
        warn!(
            attempt,
            consecutive_failures,
            ?retry_in,
            transient = error.is_transient(),
            error = %error,
            "refresh failed"
        );

        let _ = events
            .send(SyncEvent::Failed {
                attempt,
                error,
                consecutive_failures,
                retry_in,
            })
            .await;
        if self.backoff.just_degraded() {
            warn!(consecutive_failures, "sync degraded");
            let _ = events
                .send(SyncEvent::Degraded {
                    consecutive_failures,
                })
                .await;
        }

        self.state = RefreshState::Idle;
        self.next_due = Some(Instant::now() + retry_in);
    }

    fn schedule_next(&mut self) {
        self.state = RefreshState::Idle;
        let base = match self.next_refresh_at {
            Some(next_refresh_at) => self.policy.scheduled_delay(self.clock.now(), next_refresh_at),
            None => self.policy.min_interval,
        };
        let delay = base + self.policy.sample_jitter();
        debug!(?delay, "next refresh scheduled");
        self.next_due = Some(Instant::now() + delay);
    }

    fn persist(&self) {
        let Some(cache) = &self.cache else {
            return;
        };
        if let Some(envelope) = self.gate.store().current() {
            if let Err(err) = cache.persist(&envelope) {
                warn!(?err, path = %cache.path().display(), "failed to persist snapshot");
            }
        }
    }
}

async fn fetch(source: &dyn DataSource, known_hash: Option<String>) -> Result<Payload, FetchError> {
    if let Some(known_hash) = known_hash {
        let status = source.fetch_status().await?;
        if status.data_hash == known_hash {
            return Ok(Payload::Status(status));
        }
    }
    source.fetch_envelope().await.map(Payload::Envelope)
}

async fn wait_until(due: Option<Instant>) {
    match due {
        Some(due) => sleep_until(due).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{Banner, GameId},
        snapshot::SnapshotStore,
        time::ManualClock,
    };
    use chrono::{Duration as ChronoDuration, TimeZone};
    use futures::future::BoxFuture;
    use parking_lot::Mutex;
    use std::{
        collections::VecDeque,
        sync::atomic::{AtomicUsize, Ordering},
    };

    type Scripted = (Duration, Result<Envelope, FetchError>);

    /// Data source replaying scripted envelope responses in call order.
    #[derive(Default)]
    struct ScriptedSource {
        envelopes: Mutex<VecDeque<Scripted>>,
        status_hash: Mutex<Option<String>>,
        envelope_calls: AtomicUsize,
        status_calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn push(&self, delay: Duration, result: Result<Envelope, FetchError>) {
            self.envelopes.lock().push_back((delay, result));
        }

        fn envelope_calls(&self) -> usize {
            self.envelope_calls.load(Ordering::SeqCst)
        }
    }

    impl DataSource for ScriptedSource {
        fn fetch_envelope(&self) -> BoxFuture<'_, Result<Envelope, FetchError>> {
            self.envelope_calls.fetch_add(1, Ordering::SeqCst);
            let next = self.envelopes.lock().pop_front();
            Box::pin(async move {
                match next {
                    Some((delay, result)) => {
                        tokio::time::sleep(delay).await;
                        result
                    }
                    None => std::future::pending().await,
                }
            })
        }

        fn fetch_status(&self) -> BoxFuture<'_, Result<StatusResponse, FetchError>> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            let hash = self.status_hash.lock().clone();
            Box::pin(async move {
                let now = start();
                Ok(StatusResponse {
                    game_statuses: Vec::new(),
                    data_hash: hash.unwrap_or_default(),
                    fetched_at: now,
                    next_refresh_at: now + ChronoDuration::minutes(10),
                })
            })
        }
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 1, 8, 0, 0).unwrap()
    }

    fn envelope(hash: &str, character: &str) -> Envelope {
        Envelope {
            banners: vec![Banner {
                id: format!("banner-{character}"),
                game_id: GameId::Zzz,
                character: character.to_string(),
                start_date: None,
                end_date: start() + ChronoDuration::days(10),
                color: "#FB923C".to_string(),
                featured_characters: vec![character.to_string()],
            }],
            game_statuses: Vec::new(),
            fetched_at: start(),
            next_refresh_at: start() + ChronoDuration::minutes(10),
            data_hash: hash.to_string(),
        }
    }

    fn policy(cooldown: Duration, probe_status: bool) -> RefreshPolicy {
        RefreshPolicy {
            min_interval: Duration::from_secs(5),
            jitter: Duration::ZERO,
            manual_cooldown: cooldown,
            timeout: Duration::from_secs(30),
            probe_status,
        }
    }

    struct Harness {
        store: SnapshotStore,
        commands: mpsc::Sender<RefreshCommand>,
        events: mpsc::Receiver<SyncEvent>,
    }

    fn spawn(source: Arc<ScriptedSource>, store: SnapshotStore, policy: RefreshPolicy) -> Harness {
        let backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(4), 2);
        spawn_with(source, store, policy, backoff)
    }

    fn spawn_with(
        source: Arc<ScriptedSource>,
        store: SnapshotStore,
        policy: RefreshPolicy,
        backoff: Backoff,
    ) -> Harness {
        let scheduler = RefreshScheduler::new(
            source,
            HashGate::new(store.clone()),
            Arc::new(ManualClock::new(start())),
            policy,
            backoff,
        );
        let (command_tx, command_rx) = mpsc::channel(8);
        let (event_tx, event_rx) = mpsc::channel(64);
        tokio::spawn(scheduler.run(command_rx, event_tx));
        Harness {
            store,
            commands: command_tx,
            events: event_rx,
        }
    }

    async fn next_event(harness: &mut Harness) -> SyncEvent {
        harness.events.recv().await.expect("scheduler alive")
    }

    #[tokio::test(start_paused = true)]
    async fn late_result_of_older_attempt_is_discarded() {
        let source = Arc::new(ScriptedSource::default());
        source.push(Duration::from_secs(20), Ok(envelope("111111111111", "Sunna")));
        source.push(Duration::from_secs(1), Ok(envelope("222222222222", "Yixuan")));
        let mut harness = spawn(
            source.clone(),
            SnapshotStore::new(),
            policy(Duration::ZERO, false),
        );

        assert!(matches!(
            next_event(&mut harness).await,
            SyncEvent::Started { attempt: 1, trigger: RefreshTrigger::Scheduled }
        ));
        while source.envelope_calls() < 1 {
            tokio::task::yield_now().await;
        }
        harness
            .commands
            .send(RefreshCommand::Manual)
            .await
            .expect("scheduler alive");
        assert!(matches!(
            next_event(&mut harness).await,
            SyncEvent::Started { attempt: 2, trigger: RefreshTrigger::Manual }
        ));
        assert!(matches!(
            next_event(&mut harness).await,
            SyncEvent::Applied { attempt: 2, outcome: GateOutcome::Changed, .. }
        ));
        assert!(matches!(
            next_event(&mut harness).await,
            SyncEvent::Superseded { attempt: 1 }
        ));

        let current = harness.store.current().expect("snapshot applied");
        assert_eq!(current.data_hash, "222222222222");
        assert_eq!(harness.store.revision(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn identical_hash_is_applied_without_replacement() {
        let source = Arc::new(ScriptedSource::default());
        source.push(Duration::ZERO, Ok(envelope("abc123def456", "Sunna")));
        source.push(Duration::ZERO, Ok(envelope("abc123def456", "Sunna")));
        let mut harness = spawn(source, SnapshotStore::new(), policy(Duration::ZERO, false));

        let mut outcomes = Vec::new();
        while outcomes.len() < 2 {
            if let SyncEvent::Applied { outcome, .. } = next_event(&mut harness).await {
                outcomes.push(outcome);
            }
        }

        assert_eq!(outcomes, vec![GateOutcome::Changed, GateOutcome::Unchanged]);
        assert_eq!(harness.store.revision(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_back_off_degrade_and_recover() {
        let source = Arc::new(ScriptedSource::default());
        let seeded = envelope("aaaaaaaaaaaa", "Sunna");
        source.push(
            Duration::ZERO,
            Err(FetchError::Timeout {
                timeout: Duration::from_secs(30),
            }),
        );
        let mut malformed = envelope("bbbbbbbbbbbb", "Yixuan");
        malformed.banners[0].start_date = Some(malformed.banners[0].end_date);
        source.push(Duration::ZERO, Ok(malformed));
        source.push(Duration::ZERO, Ok(envelope("cccccccccccc", "Yixuan")));
        let mut harness = spawn_with(
            source,
            SnapshotStore::with_snapshot(seeded),
            policy(Duration::ZERO, false),
            Backoff::new(Duration::from_secs(8), Duration::from_secs(12), 2),
        );

        let mut retries = Vec::new();
        let mut degraded = false;
        let mut recovered = false;
        loop {
            match next_event(&mut harness).await {
                SyncEvent::Failed {
                    retry_in,
                    consecutive_failures,
                    error,
                    ..
                } => {
                    retries.push(retry_in);
                    if consecutive_failures == 2 {
                        assert!(!error.is_transient(), "second failure is the malformed payload");
                    }
                    // Last-known-good snapshot stays in place.
                    assert_eq!(
                        harness.store.data_hash().as_deref(),
                        Some("aaaaaaaaaaaa")
                    );
                }
                SyncEvent::Degraded {
                    consecutive_failures,
                } => {
                    assert_eq!(consecutive_failures, 2);
                    degraded = true;
                }
                SyncEvent::Recovered => recovered = true,
                SyncEvent::Applied { .. } => break,
                _ => {}
            }
        }

        assert_eq!(retries, vec![Duration::from_secs(8), Duration::from_secs(12)]);
        assert!(degraded && recovered);
        assert_eq!(harness.store.data_hash().as_deref(), Some("cccccccccccc"));
    }

    /// Instants at which the next `count` attempts start, with their triggers.
    async fn starts(harness: &mut Harness, count: usize) -> Vec<(Instant, RefreshTrigger)> {
        let mut seen = Vec::new();
        while seen.len() < count {
            if let SyncEvent::Started { trigger, .. } = next_event(harness).await {
                seen.push((Instant::now(), trigger));
            }
        }
        seen
    }

    #[tokio::test(start_paused = true)]
    async fn retry_after_failure_waits_for_the_floor() {
        let source = Arc::new(ScriptedSource::default());
        source.push(
            Duration::ZERO,
            Err(FetchError::Timeout {
                timeout: Duration::from_secs(30),
            }),
        );
        source.push(Duration::ZERO, Ok(envelope("abc123def456", "Sunna")));
        let mut harness = spawn(source, SnapshotStore::new(), policy(Duration::ZERO, false));

        let seen = starts(&mut harness, 2).await;
        // Backoff alone would retry after 1s; the 5s floor wins.
        assert_eq!(seen[1].0 - seen[0].0, Duration::from_secs(5));
        assert_eq!(seen[1].1, RefreshTrigger::Scheduled);
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_outside_cooldown_fetches_immediately() {
        let source = Arc::new(ScriptedSource::default());
        source.push(Duration::ZERO, Ok(envelope("111111111111", "Sunna")));
        source.push(Duration::ZERO, Ok(envelope("222222222222", "Yixuan")));
        let mut harness = spawn(source, SnapshotStore::new(), policy(Duration::ZERO, false));

        while !matches!(next_event(&mut harness).await, SyncEvent::Applied { .. }) {}
        let sent_at = Instant::now();
        harness
            .commands
            .send(RefreshCommand::Expired {
                banner_ids: vec!["banner-Sunna".to_string()],
            })
            .await
            .expect("scheduler alive");

        let seen = starts(&mut harness, 1).await;
        assert!(seen[0].0 - sent_at < Duration::from_secs(1));
        assert_eq!(seen[0].1, RefreshTrigger::Expiry);
        while !matches!(next_event(&mut harness).await, SyncEvent::Applied { .. }) {}
        assert_eq!(harness.store.data_hash().as_deref(), Some("222222222222"));
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_inside_cooldown_fetches_when_cooldown_ends() {
        let source = Arc::new(ScriptedSource::default());
        source.push(Duration::ZERO, Ok(envelope("111111111111", "Sunna")));
        source.push(Duration::ZERO, Ok(envelope("222222222222", "Yixuan")));
        let mut harness = spawn(
            source,
            SnapshotStore::new(),
            policy(Duration::from_secs(60), false),
        );

        let first = starts(&mut harness, 1).await;
        while !matches!(next_event(&mut harness).await, SyncEvent::Applied { .. }) {}
        harness
            .commands
            .send(RefreshCommand::Expired {
                banner_ids: vec!["banner-Sunna".to_string()],
            })
            .await
            .expect("scheduler alive");

        // No cooldown notice for expiry; the request waits instead of being dropped.
        let seen = starts(&mut harness, 1).await;
        assert_eq!(seen[0].0 - first[0].0, Duration::from_secs(60));
        assert_eq!(seen[0].1, RefreshTrigger::Expiry);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_refresh_respects_cooldown() {
        let source = Arc::new(ScriptedSource::default());
        source.push(Duration::ZERO, Ok(envelope("abc123def456", "Sunna")));
        let mut harness = spawn(
            source,
            SnapshotStore::new(),
            policy(Duration::from_secs(60), false),
        );

        while !matches!(next_event(&mut harness).await, SyncEvent::Applied { .. }) {}
        harness
            .commands
            .send(RefreshCommand::Manual)
            .await
            .expect("scheduler alive");

        match next_event(&mut harness).await {
            SyncEvent::CooldownActive { retry_after } => {
                assert!(retry_after <= Duration::from_secs(60));
                assert!(retry_after > Duration::ZERO);
            }
            other => panic!("expected cooldown, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn status_check_skips_full_fetch_when_hash_matches() {
        let source = Arc::new(ScriptedSource::default());
        *source.status_hash.lock() = Some("abc123def456".to_string());
        let store = SnapshotStore::with_snapshot(envelope("abc123def456", "Sunna"));
        let mut harness = spawn(source.clone(), store, policy(Duration::ZERO, true));

        match next_event(&mut harness).await {
            SyncEvent::Started { trigger, .. } => assert_eq!(trigger, RefreshTrigger::Scheduled),
            other => panic!("expected start, got {other:?}"),
        }
        match next_event(&mut harness).await {
            SyncEvent::Applied { outcome, .. } => assert_eq!(outcome, GateOutcome::Unchanged),
            other => panic!("expected applied, got {other:?}"),
        }
        assert_eq!(source.envelope_calls(), 0);
        assert_eq!(source.status_calls.load(Ordering::SeqCst), 1);
        assert_eq!(harness.store.revision(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_fetch_times_out_as_transient_failure() {
        let source = Arc::new(ScriptedSource::default());
        source.push(Duration::from_secs(120), Ok(envelope("abc123def456", "Sunna")));
        let mut harness = spawn(source, SnapshotStore::new(), policy(Duration::ZERO, false));

        loop {
            if let SyncEvent::Failed { error, .. } = next_event(&mut harness).await {
                assert!(matches!(error, FetchError::Timeout { .. }));
                assert!(error.is_transient());
                break;
            }
        }
        assert!(harness.store.is_loading());
    }

    #[test]
    fn sequencer_admits_only_newer_results() {
        let mut sequencer = AttemptSequencer::default();
        let first = sequencer.begin();
        let second = sequencer.begin();

        assert!(sequencer.mark_applied(second));
        assert!(!sequencer.is_current(first));
        assert!(!sequencer.mark_applied(first));
        assert_eq!(sequencer.last_applied(), second);
    }
}
