use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::{Instant, timeout};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::checker::{ConnectParams, Connector};
use super::types::{MonitorResult, ProbeError};
use crate::config::DatabaseTarget;

/// Runs one liveness check against one database
pub struct HealthProbe {
    connector: Arc<dyn Connector>,
    timeout: Duration,
}

impl HealthProbe {
    pub fn new(connector: Arc<dyn Connector>, timeout: Duration) -> Self {
        Self { connector, timeout }
    }

    /// Check `target` once.
    ///
    /// Never fails: open and liveness errors become a down result. A failed
    /// open reports a zero response time. The session is closed on every path
    /// that opened one.
    pub async fn check(&self, target: &DatabaseTarget, cancel: &CancellationToken) -> MonitorResult {
        let check_time = Utc::now();
        let start = Instant::now();
        let params = ConnectParams::from(target);

        let mut session = match self.connector.open(&params).await {
            Ok(session) => session,
            Err(e) => {
                debug!(db = %target.name, error = %e, "Session open failed");
                return MonitorResult::down(&target.name, check_time, 0.0, &e);
            }
        };

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ProbeError::Cancelled),
            ping = timeout(self.timeout, session.ping()) => match ping {
                Ok(result) => result,
                Err(_) => Err(ProbeError::Timeout(self.timeout)),
            },
        };
        let response_time = start.elapsed().as_secs_f64();

        session.close().await;

        match outcome {
            Ok(()) => MonitorResult::up(&target.name, check_time, response_time),
            Err(e) => MonitorResult::down(&target.name, check_time, response_time, &e),
        }
    }
}
