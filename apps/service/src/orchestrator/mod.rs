//! Orchestrator module - owns the service lifecycle
//!
//! The orchestrator wires the monitoring engine together:
//! - One worker pool and one task tracker for the whole service lifetime
//! - The scheduler loop, driven by a cancellation token
//! - The optional retention cleanup task
//!
//! `start` runs until the token is cancelled; `shutdown` then waits for every
//! task the service spawned.

pub mod retention;


pub use retention::{RetentionCleanup, RetentionPolicy};

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::info;

use crate::config::Config;
use crate::database::ResultSink;
use crate::monitoring::{
    AlertHook, Connector, CycleRunner, HealthProbe, LogAlertHook, MonitoringScheduler, WorkerPool,
};

/// Main orchestrator for the monitor service
pub struct Orchestrator {
    scheduler: MonitoringScheduler,
    pool: WorkerPool,
    tracker: TaskTracker,
    sink: Arc<dyn ResultSink>,
    retention: Option<RetentionPolicy>,
}

impl Orchestrator {
    /// Build the service with the default logging alert hook
    pub fn new(config: &Config, sink: Arc<dyn ResultSink>, connector: Arc<dyn Connector>) -> Self {
        Self::with_alert_hook(config, sink, connector, Arc::new(LogAlertHook))
    }

    pub fn with_alert_hook(
        config: &Config,
        sink: Arc<dyn ResultSink>,
        connector: Arc<dyn Connector>,
        alert: Arc<dyn AlertHook>,
    ) -> Self {
        let tracker = TaskTracker::new();
        let pool = WorkerPool::new(config.monitor.max_concurrent);
        let probe = Arc::new(HealthProbe::new(connector, Duration::from_secs(config.monitor.timeout)));

        let runner = CycleRunner::new(
            config.databases.clone(),
            probe,
            pool.clone(),
            sink.clone(),
            alert,
            tracker.clone(),
        );
        let scheduler = MonitoringScheduler::new(Arc::new(runner), Duration::from_secs(config.monitor.interval));

        let retention = config.storage.retention_days.map(|result_days| RetentionPolicy {
            result_days,
            cleanup_every: Duration::from_secs(config.storage.cleanup_interval),
        });

        info!(
            databases = config.databases.len(),
            enabled = config.enabled_targets().count(),
            max_concurrent = pool.capacity(),
            timeout_secs = config.monitor.timeout,
            "Monitor service configured"
        );

        Self { scheduler, pool, tracker, sink, retention }
    }

    /// Run until `cancel` fires.
    ///
    /// Probe and storage failures never end this loop; only an unusable
    /// schedule does.
    pub async fn start(&self, cancel: CancellationToken) -> Result<()> {
        if let Some(policy) = &self.retention {
            let cleanup = RetentionCleanup::new(self.sink.clone(), policy.clone());
            info!(
                "Retention policy: keep {}d of history, prune every {}s",
                cleanup.policy().result_days,
                cleanup.policy().cleanup_every.as_secs()
            );
            cleanup.start_periodic_cleanup(&self.tracker, cancel.clone());
        }

        let cycles = self.scheduler.run(&cancel).await?;
        info!(cycles, "Monitor service stopped scheduling");
        Ok(())
    }

    /// Wait for every probe and background task to finish.
    ///
    /// Call after cancelling the token passed to `start`; probes observe the
    /// same token, so the wait is bounded by the probe timeout.
    pub async fn shutdown(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.pool.close();
        info!("All monitor tasks drained");
    }
}
