use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use super::worker_pool::AcquireError;

/// Why a probe reported the target as unreachable
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProbeError {
    /// The session could not be opened (bad descriptor, auth, driver)
    #[error("failed to open session: {0}")]
    Open(String),

    /// The liveness check ran and failed
    #[error("liveness check failed: {0}")]
    Ping(String),

    #[error("liveness check timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    #[error("check cancelled before completion")]
    Cancelled,

    #[error("worker pool closed before the check could start")]
    PoolClosed,

    #[error("probe task panicked: {0}")]
    Panicked(String),
}

/// Error classes kept alongside a failed result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeErrorKind {
    Open,
    Ping,
    Timeout,
    Cancelled,
    PoolClosed,
    Panicked,
}

impl ProbeError {
    pub fn kind(&self) -> ProbeErrorKind {
        match self {
            ProbeError::Open(_) => ProbeErrorKind::Open,
            ProbeError::Ping(_) => ProbeErrorKind::Ping,
            ProbeError::Timeout(_) => ProbeErrorKind::Timeout,
            ProbeError::Cancelled => ProbeErrorKind::Cancelled,
            ProbeError::PoolClosed => ProbeErrorKind::PoolClosed,
            ProbeError::Panicked(_) => ProbeErrorKind::Panicked,
        }
    }
}

impl From<AcquireError> for ProbeError {
    fn from(err: AcquireError) -> Self {
        match err {
            AcquireError::Cancelled => ProbeError::Cancelled,
            AcquireError::Closed => ProbeError::PoolClosed,
        }
    }
}

impl std::fmt::Display for ProbeErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeErrorKind::Open => write!(f, "open"),
            ProbeErrorKind::Ping => write!(f, "ping"),
            ProbeErrorKind::Timeout => write!(f, "timeout"),
            ProbeErrorKind::Cancelled => write!(f, "cancelled"),
            ProbeErrorKind::PoolClosed => write!(f, "pool_closed"),
            ProbeErrorKind::Panicked => write!(f, "panicked"),
        }
    }
}

/// Outcome of one probe against one target.
///
/// Built only through [`MonitorResult::up`] and [`MonitorResult::down`], so
/// `error` is present exactly when `status` is false.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorResult {
    /// Configured name of the database that was checked
    pub target_name: String,

    /// Whether the target answered the liveness check
    pub status: bool,

    /// Seconds from probe start to the end of the liveness check
    pub response_time: f64,

    /// Error message (if check failed)
    pub error: Option<String>,

    #[serde(skip)]
    pub error_kind: Option<ProbeErrorKind>,

    /// When the probe started
    pub check_time: DateTime<Utc>,
}

impl MonitorResult {
    /// A reachable target
    pub fn up(target_name: impl Into<String>, check_time: DateTime<Utc>, response_time: f64) -> Self {
        Self {
            target_name: target_name.into(),
            status: true,
            response_time: response_time.max(0.0),
            error: None,
            error_kind: None,
            check_time,
        }
    }

    /// An unreachable target
    pub fn down(
        target_name: impl Into<String>,
        check_time: DateTime<Utc>,
        response_time: f64,
        error: &ProbeError,
    ) -> Self {
        Self {
            target_name: target_name.into(),
            status: false,
            response_time: response_time.max(0.0),
            error: Some(error.to_string()),
            error_kind: Some(error.kind()),
            check_time,
        }
    }

    pub fn is_down(&self) -> bool {
        !self.status
    }
}

impl std::fmt::Display for MonitorResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = if self.status { "up" } else { "down" };
        write!(f, "{} {} in {:.3}s", self.target_name, status, self.response_time)?;
        if let Some(error) = &self.error {
            write!(f, ": {error}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn up_has_no_error() {
        let result = MonitorResult::up("orders", Utc::now(), 0.25);
        assert!(result.status);
        assert!(result.error.is_none());
        assert!(result.error_kind.is_none());
        assert_eq!(result.response_time, 0.25);
    }

    #[test]
    fn down_always_carries_message_and_kind() {
        let err = ProbeError::Timeout(Duration::from_secs(5));
        let result = MonitorResult::down("orders", Utc::now(), 5.0, &err);
        assert!(result.is_down());
        assert_eq!(result.error.as_deref(), Some("liveness check timed out after 5s"));
        assert_eq!(result.error_kind, Some(ProbeErrorKind::Timeout));
    }

    #[test]
    fn acquire_failures_keep_their_cause() {
        assert_eq!(ProbeError::from(AcquireError::Cancelled), ProbeError::Cancelled);
        assert_eq!(ProbeError::from(AcquireError::Closed).kind(), ProbeErrorKind::PoolClosed);
    }

    #[test]
    fn negative_response_time_is_clamped() {
        let result = MonitorResult::up("orders", Utc::now(), -1.0);
        assert_eq!(result.response_time, 0.0);
    }

    #[test]
    fn display_includes_error() {
        let err = ProbeError::Open("empty host".into());
        let result = MonitorResult::down("billing", Utc::now(), 0.0, &err);
        assert_eq!(result.to_string(), "billing down in 0.000s: failed to open session: empty host");
    }
}
