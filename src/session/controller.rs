//! Test orchestration: the Idle/Running state machine, tick loop, and
//! budget enforcement.

use std::time::{Duration, Instant};

use reqwest::Client;
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::counter::TrafficCounter;
use super::events::{EventKind, EventLog, EventRecord};
use super::speed::SpeedWindow;
use super::worker::{TransferWorker, WorkerEvent};
use super::{
    SessionError, SessionParams, SessionSummary, Snapshot, StopReason, SPEED_WINDOW, TICK_PERIOD,
};

// ---------------------------------------------------------------------------
// TestController
// ---------------------------------------------------------------------------

/// Handle to the in-flight run task; present only while a session runs.
struct ActiveRun {
    stop: CancellationToken,
    finished: watch::Receiver<bool>,
    task: JoinHandle<SessionSummary>,
}

/// Orchestrates N transfer workers against a traffic budget.
///
/// The controller is idle until [`start`](TestController::start) succeeds and
/// returns to idle when the budget is reached, the operator stops it, or
/// every slot fails. `start` while running and `stop` while idle are no-ops.
pub struct TestController {
    client: Client,
    snapshots: watch::Sender<Snapshot>,
    events: broadcast::Sender<EventRecord>,
    active: Mutex<Option<ActiveRun>>,
}

impl Default for TestController {
    fn default() -> Self {
        Self::new()
    }
}

impl TestController {
    pub fn new() -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to build HTTP client");
        let (snapshots, _) = watch::channel(Snapshot::default());
        let (events, _) = broadcast::channel(256);

        Self {
            client,
            snapshots,
            events,
            active: Mutex::new(None),
        }
    }

    /// Subscribe to per-tick metric snapshots.
    pub fn snapshots(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.subscribe()
    }

    /// Subscribe to live lifecycle events.
    pub fn events(&self) -> broadcast::Receiver<EventRecord> {
        self.events.subscribe()
    }

    pub async fn is_running(&self) -> bool {
        self.active
            .lock()
            .await
            .as_ref()
            .is_some_and(|run| !run.task.is_finished())
    }

    /// Start a session.
    ///
    /// Validation failures leave the controller idle; starting while a
    /// session is already running is a no-op.
    pub async fn start(&self, params: SessionParams) -> Result<(), SessionError> {
        params.validate()?;

        let mut active = self.active.lock().await;
        if let Some(run) = active.as_ref() {
            if !run.task.is_finished() {
                debug!("start ignored: session already running");
                return Ok(());
            }
        }

        let stop = CancellationToken::new();
        let (finished_tx, finished_rx) = watch::channel(false);
        let run = SessionRun {
            id: Uuid::new_v4(),
            client: self.client.clone(),
            params,
            snapshots: self.snapshots.clone(),
            log: EventLog::new(self.events.clone()),
            stop: stop.clone(),
            finished: finished_tx,
        };
        let task = tokio::spawn(run.drive());

        *active = Some(ActiveRun {
            stop,
            finished: finished_rx,
            task,
        });
        Ok(())
    }

    /// Request a stop. No-op while idle; otherwise every worker's in-flight
    /// read is aborted promptly.
    pub async fn stop(&self) {
        match self.active.lock().await.as_ref() {
            Some(run) => run.stop.cancel(),
            None => debug!("stop ignored: no session running"),
        }
    }

    /// Wait for the current session to finish and return its summary.
    ///
    /// Returns `None` when no session has been started since the last join.
    pub async fn join(&self) -> Option<SessionSummary> {
        // Wait without holding the state lock so `stop` stays responsive.
        let mut finished = {
            let active = self.active.lock().await;
            active.as_ref()?.finished.clone()
        };
        while !*finished.borrow() {
            if finished.changed().await.is_err() {
                break;
            }
        }

        let run = self.active.lock().await.take()?;
        match run.task.await {
            Ok(summary) => Some(summary),
            Err(e) => {
                warn!(error = %e, "session task aborted");
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// SessionRun
// ---------------------------------------------------------------------------

/// State owned by the single run task. All session mutation happens here:
/// workers only report deltas over the event channel.
struct SessionRun {
    id: Uuid,
    client: Client,
    params: SessionParams,
    snapshots: watch::Sender<Snapshot>,
    log: EventLog,
    stop: CancellationToken,
    finished: watch::Sender<bool>,
}

impl SessionRun {
    async fn drive(mut self) -> SessionSummary {
        let started = Instant::now();
        let counter = TrafficCounter::new();
        let mut speed = SpeedWindow::new(SPEED_WINDOW, started);
        let thread_count = self.params.thread_count;

        info!(
            session = %self.id,
            url = %self.params.url,
            threads = thread_count,
            target_bytes = self.params.target_bytes,
            "session started"
        );
        self.publish_snapshot(0.0, 0, started);
        self.log.push(EventKind::SessionStarted {
            threads: thread_count,
            target_bytes: self.params.target_bytes,
        });

        let workers_cancel = CancellationToken::new();
        let (worker_tx, mut worker_rx) = mpsc::unbounded_channel();
        let mut active_slots = vec![true; thread_count as usize];
        let mut handles = Vec::with_capacity(thread_count as usize);
        for id in 0..thread_count {
            handles.push(TransferWorker::spawn(
                id,
                self.client.clone(),
                self.params.url.clone(),
                worker_tx.clone(),
                workers_cancel.clone(),
            ));
        }
        drop(worker_tx);

        // Skip the interval's immediate first tick; the estimator was primed
        // at `started`.
        let mut tick =
            tokio::time::interval_at(tokio::time::Instant::now() + TICK_PERIOD, TICK_PERIOD);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let reason = loop {
            tokio::select! {
                _ = self.stop.cancelled() => break StopReason::UserStopped,

                _ = tick.tick() => {
                    let rate = speed.sample(counter.total(), Instant::now());
                    self.publish_snapshot(rate, counter.total(), started);
                }

                event = worker_rx.recv() => match event {
                    Some(WorkerEvent::Connected { id }) => {
                        self.log.push(EventKind::ThreadConnected { id });
                    }
                    Some(WorkerEvent::Bytes { id: _, len }) => {
                        // The budget check happens in the same step that
                        // records the bytes; overshoot is at most the
                        // in-flight chunks and is reported, never clamped.
                        let total = counter.add(len);
                        if total >= self.params.target_bytes {
                            break StopReason::TargetReached;
                        }
                    }
                    Some(WorkerEvent::Completed { id }) => {
                        self.log.push(EventKind::ThreadCompleted { id });
                    }
                    Some(WorkerEvent::Failed { id, error }) => {
                        active_slots[id as usize] = false;
                        self.log.push(EventKind::ThreadFailed { id, reason: error });
                        if active_slots.iter().all(|active| !active) {
                            break StopReason::AllWorkersFailed;
                        }
                    }
                    None => {
                        warn!(session = %self.id, "worker channel closed unexpectedly");
                        break StopReason::AllWorkersFailed;
                    }
                }
            }
        };

        // Teardown: abort every in-flight read, then wait for the slots to
        // wind down before accounting.
        workers_cancel.cancel();
        for handle in handles {
            let _ = handle.await;
        }

        for (id, active) in active_slots.iter().enumerate() {
            if *active {
                self.log.push(EventKind::ThreadStopped { id: id as u32 });
            }
        }
        match reason {
            StopReason::TargetReached => self.log.push(EventKind::TargetReached {
                total_bytes: counter.total(),
            }),
            StopReason::UserStopped => self.log.push(EventKind::StoppedByUser),
            StopReason::AllWorkersFailed => self.log.push(EventKind::AllThreadsInterrupted),
        }

        let total = counter.total();
        let elapsed = started.elapsed().as_secs_f64();
        let mean = if elapsed > 0.0 { total as f64 / elapsed } else { 0.0 };
        self.publish_snapshot(speed.average().unwrap_or(0.0), total, started);

        info!(
            session = %self.id,
            reason = %reason,
            total_bytes = total,
            elapsed_secs = elapsed,
            "session finished"
        );

        let summary = SessionSummary {
            session_id: self.id,
            reason,
            total_bytes: total,
            elapsed_secs: elapsed,
            mean_bytes_per_sec: mean,
            events: self.log.into_entries(),
        };
        let _ = self.finished.send(true);
        summary
    }

    fn publish_snapshot(&self, rate: f64, total: u64, started: Instant) {
        let progress =
            (total as f64 / self.params.target_bytes as f64 * 100.0).min(100.0);
        let _ = self.snapshots.send(Snapshot {
            smoothed_bytes_per_sec: rate,
            total_bytes: total,
            progress_pct: progress,
            elapsed_secs: started.elapsed().as_secs_f64(),
        });
    }
}
