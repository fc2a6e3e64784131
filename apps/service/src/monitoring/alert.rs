use tracing::warn;

use super::types::MonitorResult;

/// Called for every failed result drained in a cycle
pub trait AlertHook: Send + Sync {
    fn on_failure(&self, result: &MonitorResult);
}

/// Logs the failure and does nothing else.
///
/// `[alert]` cadence settings are not consulted; delivery and backoff are
/// not implemented.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAlertHook;

impl AlertHook for LogAlertHook {
    fn on_failure(&self, result: &MonitorResult) {
        warn!(
            db = %result.target_name,
            kind = ?result.error_kind,
            error = result.error.as_deref().unwrap_or_default(),
            "Database {} is down",
            result.target_name
        );
    }
}
