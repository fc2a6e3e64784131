use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::cycle::CycleRunner;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("monitor interval must be greater than zero")]
    ZeroInterval,
    #[error("monitor interval of {}s is too long to schedule", .0.as_secs())]
    IntervalTooLong(Duration),
}

/// Fires one cycle per interval tick, never two at once.
///
/// The cycle runs inline in the scheduling loop and the timer skips ticks
/// that fell due while a cycle was running, so a slow cycle delays the next
/// one instead of queueing a burst.
pub struct MonitoringScheduler {
    runner: Arc<CycleRunner>,
    period: Duration,
}

impl MonitoringScheduler {
    pub fn new(runner: Arc<CycleRunner>, period: Duration) -> Self {
        Self { runner, period }
    }

    /// Run cycles until `cancel` fires. The first cycle starts one period
    /// after the call.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<u64, SchedulerError> {
        if self.period.is_zero() {
            return Err(SchedulerError::ZeroInterval);
        }

        let first_tick = Instant::now()
            .checked_add(self.period)
            .ok_or(SchedulerError::IntervalTooLong(self.period))?;
        let mut timer = interval_at(first_tick, self.period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(interval_secs = self.period.as_secs_f64(), "Monitoring scheduler started");
        let mut cycles = 0u64;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = timer.tick() => {
                    cycles += 1;
                    debug!(cycle = cycles, "Starting monitor cycle");
                    self.runner.run_cycle(cancel).await;
                }
            }
        }

        info!(cycles, "Monitoring scheduler stopped");
        Ok(cycles)
    }
}
