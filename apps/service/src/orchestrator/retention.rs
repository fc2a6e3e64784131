//! Automatic retention and cleanup of monitoring history.
//!
//! Rows older than the configured number of days are deleted on a fixed
//! cadence as a background task.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::database::ResultSink;

/// How long to keep history and how often to prune it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Days to keep monitor history
    pub result_days: u32,
    /// Time between two cleanup passes
    pub cleanup_every: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self { result_days: 30, cleanup_every: Duration::from_secs(3600) }
    }
}

/// Cleanup manager for expired history
pub struct RetentionCleanup {
    sink: Arc<dyn ResultSink>,
    policy: RetentionPolicy,
}

impl RetentionCleanup {
    /// Create a new retention cleanup manager
    pub fn new(sink: Arc<dyn ResultSink>, policy: RetentionPolicy) -> Self {
        Self { sink, policy }
    }

    pub fn policy(&self) -> &RetentionPolicy {
        &self.policy
    }

    /// Run one cleanup pass
    pub async fn cleanup_expired_results(&self) -> Result<u64> {
        let deleted = self.sink.cleanup_old_data(self.policy.result_days).await?;
        info!("Retention cleanup completed: {} rows older than {} days deleted", deleted, self.policy.result_days);
        Ok(deleted)
    }

    /// Start the background cleanup task on `tracker`.
    ///
    /// The first pass runs immediately, then once per `cleanup_every`, until
    /// `cancel` fires.
    pub fn start_periodic_cleanup(self, tracker: &TaskTracker, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        tracker.spawn(async move {
            let mut interval = tokio::time::interval(self.policy.cleanup_every);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        if let Err(e) = self.cleanup_expired_results().await {
                            warn!("Periodic retention cleanup failed: {:#}", e);
                        }
                    }
                }
            }

            debug!("Retention cleanup task stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingSink;

    #[test]
    fn test_retention_policy_defaults() {
        let policy = RetentionPolicy::default();
        assert_eq!(policy.result_days, 30);
        assert_eq!(policy.cleanup_every, Duration::from_secs(3600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_cleanup_until_cancelled() {
        let sink = Arc::new(RecordingSink::new());
        let policy = RetentionPolicy { result_days: 14, cleanup_every: Duration::from_secs(60) };
        let tracker = TaskTracker::new();
        let cancel = CancellationToken::new();

        let handle = RetentionCleanup::new(sink.clone(), policy).start_periodic_cleanup(&tracker, cancel.clone());

        // Passes at 0, 60, 120
        tokio::time::sleep(Duration::from_secs(150)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(sink.cleanups(), vec![14, 14, 14]);
    }
}
