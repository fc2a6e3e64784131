use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info};

use super::alert::AlertHook;
use super::executor::HealthProbe;
use super::types::{MonitorResult, ProbeError};
use super::worker_pool::WorkerPool;
use crate::config::DatabaseTarget;
use crate::database::ResultSink;

/// Counts for one finished cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub dispatched: usize,
    pub up: usize,
    pub down: usize,
    pub save_failures: usize,
}

/// Dispatches one probe per enabled target and persists what comes back
pub struct CycleRunner {
    targets: Arc<[DatabaseTarget]>,
    probe: Arc<HealthProbe>,
    pool: WorkerPool,
    sink: Arc<dyn ResultSink>,
    alert: Arc<dyn AlertHook>,
    tracker: TaskTracker,
}

impl CycleRunner {
    /// `tracker` is the service-wide tracker that shutdown waits on.
    pub fn new(
        targets: Vec<DatabaseTarget>,
        probe: Arc<HealthProbe>,
        pool: WorkerPool,
        sink: Arc<dyn ResultSink>,
        alert: Arc<dyn AlertHook>,
        tracker: TaskTracker,
    ) -> Self {
        Self { targets: targets.into(), probe, pool, sink, alert, tracker }
    }

    fn enabled_targets(&self) -> Vec<DatabaseTarget> {
        self.targets.iter().filter(|target| target.enabled).cloned().collect()
    }

    /// Run one full cycle.
    ///
    /// Returns once every dispatched probe has produced its result and every
    /// result has been handed to the sink. Sink errors are logged and counted.
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> CycleSummary {
        let started = Instant::now();
        let targets = self.enabled_targets();
        let mut summary = CycleSummary { dispatched: targets.len(), ..CycleSummary::default() };

        if targets.is_empty() {
            debug!("No enabled databases, skipping cycle");
            return summary;
        }

        let (result_tx, mut result_rx) = mpsc::channel::<MonitorResult>(targets.len());

        for target in targets {
            let result_tx = result_tx.clone();
            let probe = self.probe.clone();
            let pool = self.pool.clone();
            let cancel = cancel.clone();

            self.tracker.spawn(async move {
                let result = run_guarded(&target, &probe, &pool, &cancel).await;
                // Capacity equals the number of senders, so this never waits
                if result_tx.send(result).await.is_err() {
                    error!(db = %target.name, "Cycle dropped its result receiver");
                }
            });
        }
        // The channel closes once the last task drops its sender
        drop(result_tx);

        while let Some(result) = result_rx.recv().await {
            self.handle_result(&result, &mut summary).await;
        }

        info!(
            dispatched = summary.dispatched,
            up = summary.up,
            down = summary.down,
            save_failures = summary.save_failures,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Monitor cycle completed"
        );
        summary
    }

    async fn handle_result(&self, result: &MonitorResult, summary: &mut CycleSummary) {
        if result.status {
            summary.up += 1;
            debug!(db = %result.target_name, response_time = result.response_time, "Database is up");
        } else {
            summary.down += 1;
        }

        if let Err(e) = self.sink.save_result(result).await {
            summary.save_failures += 1;
            error!("Failed to save result for {}: {:#}", result.target_name, e);
        }

        if result.is_down() {
            self.alert.on_failure(result);
        }
    }
}

/// Hold a worker slot for the duration of one probe and turn every way the
/// probe can end into exactly one result.
async fn run_guarded(
    target: &DatabaseTarget,
    probe: &HealthProbe,
    pool: &WorkerPool,
    cancel: &CancellationToken,
) -> MonitorResult {
    let queued_at = Utc::now();

    let _slot = match pool.acquire(cancel).await {
        Ok(slot) => slot,
        Err(e) => {
            debug!(db = %target.name, error = %e, "No worker slot");
            return MonitorResult::down(&target.name, queued_at, 0.0, &ProbeError::from(e));
        }
    };

    match AssertUnwindSafe(probe.check(target, cancel)).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!(db = %target.name, "Probe panicked: {message}");
            MonitorResult::down(&target.name, queued_at, 0.0, &ProbeError::Panicked(message))
        }
    }
}
