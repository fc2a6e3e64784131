use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

/// One stored row of `monitor_history`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryRecord {
    pub id: i64,
    pub target_name: String,
    pub status: bool,
    pub response_time: Option<f64>,
    pub error: Option<String>,
    pub check_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Convert a timestamp to unix milliseconds
pub fn timestamp_to_i64(time: DateTime<Utc>) -> i64 {
    time.timestamp_millis()
}

/// Convert unix milliseconds back to a timestamp
pub fn i64_to_timestamp(timestamp: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(timestamp).single().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_keep_milliseconds() {
        let time = Utc.timestamp_millis_opt(1_700_000_000_456).unwrap();
        assert_eq!(timestamp_to_i64(time), 1_700_000_000_456);
        assert_eq!(i64_to_timestamp(1_700_000_000_456), time);
        assert_eq!(i64_to_timestamp(1_700_000_000_456).timestamp_subsec_millis(), 456);
    }
}
