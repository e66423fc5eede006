// =============================================================================
// Poll Scheduler — independent periodic fetch tasks
// =============================================================================
//
// Each data domain (ticker, order book, trades, candle tail, full resync)
// runs as its own periodic task with its own cadence. A task awaits its fetch
// inline and discards tick boundaries that elapse while the fetch is still in
// flight, so at most one fetch per domain is ever outstanding and results
// land in dispatch order within a domain. Failures are logged, recorded on
// the task board, and the tick is skipped — no retry, no crash, no effect on
// other tasks.
//
// The scheduler owns a cancellation token; `shutdown` stops every task
// deterministically (an in-flight fetch finishes first, bounded by the HTTP
// client timeout).
// =============================================================================

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::MarketError;

// ---------------------------------------------------------------------------
// Task board
// ---------------------------------------------------------------------------

/// Lifecycle of a poll task between tick boundaries. `Fetching` doubles as
/// the in-flight flag: a task in this phase has exactly one outstanding fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPhase {
    Idle,
    Fetching,
}

/// Serialisable per-task status for the `/status` endpoint. This is the
/// staleness surface: a presenter can flag a view whose task has not
/// succeeded recently.
#[derive(Debug, Clone, Serialize)]
pub struct TaskStatus {
    pub phase: TaskPhase,
    pub period_ms: u64,
    pub total_runs: u64,
    pub consecutive_failures: u32,
    /// Estimated tick boundaries slept through while a fetch was in flight.
    pub overrun_ticks: u64,
    pub last_error: Option<String>,
    /// Milliseconds since the last successful run; `None` before the first.
    pub last_success_age_ms: Option<u64>,
}

#[derive(Debug)]
struct TaskEntry {
    phase: TaskPhase,
    period: Duration,
    total_runs: u64,
    consecutive_failures: u32,
    overrun_ticks: u64,
    last_error: Option<String>,
    last_success: Option<Instant>,
}

/// Shared run/failure/staleness bookkeeping for all poll tasks.
#[derive(Default)]
pub struct TaskBoard {
    entries: RwLock<HashMap<&'static str, TaskEntry>>,
}

impl TaskBoard {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, name: &'static str, period: Duration) {
        self.entries.write().insert(
            name,
            TaskEntry {
                phase: TaskPhase::Idle,
                period,
                total_runs: 0,
                consecutive_failures: 0,
                overrun_ticks: 0,
                last_error: None,
                last_success: None,
            },
        );
    }

    fn mark_fetching(&self, name: &'static str) {
        if let Some(entry) = self.entries.write().get_mut(name) {
            entry.phase = TaskPhase::Fetching;
        }
    }

    fn record_success(&self, name: &'static str) {
        if let Some(entry) = self.entries.write().get_mut(name) {
            entry.phase = TaskPhase::Idle;
            entry.total_runs += 1;
            entry.consecutive_failures = 0;
            entry.last_error = None;
            entry.last_success = Some(Instant::now());
        }
    }

    fn record_failure(&self, name: &'static str, error: String) {
        if let Some(entry) = self.entries.write().get_mut(name) {
            entry.phase = TaskPhase::Idle;
            entry.total_runs += 1;
            entry.consecutive_failures += 1;
            entry.last_error = Some(error);
        }
    }

    fn record_overrun(&self, name: &'static str, missed: u64) {
        if let Some(entry) = self.entries.write().get_mut(name) {
            entry.overrun_ticks += missed;
        }
    }

    pub fn snapshot(&self) -> HashMap<String, TaskStatus> {
        self.entries
            .read()
            .iter()
            .map(|(name, entry)| {
                (
                    name.to_string(),
                    TaskStatus {
                        phase: entry.phase,
                        period_ms: entry.period.as_millis() as u64,
                        total_runs: entry.total_runs,
                        consecutive_failures: entry.consecutive_failures,
                        overrun_ticks: entry.overrun_ticks,
                        last_error: entry.last_error.clone(),
                        last_success_age_ms: entry
                            .last_success
                            .map(|t| t.elapsed().as_millis() as u64),
                    },
                )
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

pub struct PollScheduler {
    board: Arc<TaskBoard>,
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl PollScheduler {
    pub fn new(board: Arc<TaskBoard>) -> Self {
        Self {
            board,
            cancel: CancellationToken::new(),
            handles: Vec::new(),
        }
    }

    /// Spawn a periodic task. The first fire is one period after spawn (the
    /// composition root performs the initial fetches itself).
    ///
    /// `job` is re-invoked on every fire; a returned error marks the tick
    /// failed and skipped. The tick boundary is armed by wall clock, but a
    /// boundary reached while `job` is still running is discarded rather than
    /// queued, keeping at most one fetch in flight per task.
    pub fn spawn<F, Fut>(&mut self, name: &'static str, period: Duration, mut job: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), MarketError>> + Send + 'static,
    {
        self.board.register(name, period);

        let cancel = self.cancel.clone();
        let board = self.board.clone();

        let handle = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut ticker = tokio::time::interval_at(start, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!(task = name, "poll task stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let started = Instant::now();
                        board.mark_fetching(name);
                        match job().await {
                            Ok(()) => board.record_success(name),
                            Err(e) => {
                                warn!(task = name, error = %e, "poll tick failed — skipping");
                                board.record_failure(name, e.to_string());
                            }
                        }

                        let elapsed = started.elapsed();
                        if elapsed > period {
                            let missed =
                                (elapsed.as_millis() / period.as_millis().max(1)) as u64;
                            board.record_overrun(name, missed);
                        }
                    }
                }
            }
        });

        self.handles.push(handle);
    }

    pub fn task_count(&self) -> usize {
        self.handles.len()
    }

    /// Stop every task and wait for them to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for handle in self.handles {
            let _ = handle.await;
        }
        info!("poll scheduler stopped");
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

    #[tokio::test]
    async fn task_fires_periodically() {
        let board = Arc::new(TaskBoard::new());
        let mut scheduler = PollScheduler::new(board.clone());

        let runs = Arc::new(AtomicU32::new(0));
        let counter = runs.clone();
        scheduler.spawn("ticker", Duration::from_millis(20), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        tokio::time::sleep(Duration::from_millis(150)).await;
        scheduler.shutdown().await;

        assert!(runs.load(Ordering::SeqCst) >= 3);
        let statuses = board.snapshot();
        let status = &statuses["ticker"];
        assert!(status.total_runs >= 3);
        assert_eq!(status.consecutive_failures, 0);
        assert_eq!(status.phase, TaskPhase::Idle);
        assert!(status.last_success_age_ms.is_some());
    }

    #[tokio::test]
    async fn slow_fetch_never_overlaps_itself() {
        let board = Arc::new(TaskBoard::new());
        let mut scheduler = PollScheduler::new(board);

        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_in_flight = Arc::new(AtomicUsize::new(0));

        let gauge = in_flight.clone();
        let high_water = max_in_flight.clone();
        scheduler.spawn("depth", Duration::from_millis(10), move || {
            let gauge = gauge.clone();
            let high_water = high_water.clone();
            async move {
                let now = gauge.fetch_add(1, Ordering::SeqCst) + 1;
                high_water.fetch_max(now, Ordering::SeqCst);
                // Fetch outlives several tick boundaries.
                tokio::time::sleep(Duration::from_millis(45)).await;
                gauge.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }
        });

        tokio::time::sleep(Duration::from_millis(200)).await;
        scheduler.shutdown().await;

        // The guard held: no second fetch was dispatched while one was in
        // flight, even though many tick boundaries elapsed mid-fetch.
        assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failures_are_isolated_per_task() {
        let board = Arc::new(TaskBoard::new());
        let mut scheduler = PollScheduler::new(board.clone());

        scheduler.spawn("tape", Duration::from_millis(15), move || async move {
            Err(MarketError::DataUnavailable("connection refused".into()))
        });

        let ok_runs = Arc::new(AtomicU32::new(0));
        let counter = ok_runs.clone();
        scheduler.spawn("ticker", Duration::from_millis(15), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        tokio::time::sleep(Duration::from_millis(120)).await;
        scheduler.shutdown().await;

        let statuses = board.snapshot();
        let failing = &statuses["tape"];
        assert!(failing.consecutive_failures >= 2, "failing task kept running");
        assert!(failing.last_error.as_deref().unwrap().contains("connection refused"));
        // The healthy task never noticed.
        assert!(ok_runs.load(Ordering::SeqCst) >= 3);
        assert_eq!(statuses["ticker"].consecutive_failures, 0);
    }

    #[tokio::test]
    async fn shutdown_stops_all_tasks() {
        let board = Arc::new(TaskBoard::new());
        let mut scheduler = PollScheduler::new(board);

        let runs = Arc::new(AtomicU32::new(0));
        let counter = runs.clone();
        scheduler.spawn("ticker", Duration::from_millis(10), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        assert_eq!(scheduler.task_count(), 1);

        tokio::time::sleep(Duration::from_millis(50)).await;
        scheduler.shutdown().await;

        let after_shutdown = runs.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(runs.load(Ordering::SeqCst), after_shutdown);
    }
}
