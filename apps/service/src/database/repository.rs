use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use libsql::params;
use tokio::sync::Mutex;
use tracing::debug;

use super::initialize_database;
use super::models::{HistoryRecord, i64_to_timestamp, timestamp_to_i64};
use crate::monitoring::types::MonitorResult;
use crate::pool::{LibsqlManager, LibsqlPool};

/// Where probe results end up.
///
/// Implementations serialize their own writes; the core calls them from one
/// cycle at a time but over the whole service lifetime.
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Append one result to the history
    async fn save_result(&self, result: &MonitorResult) -> Result<()>;

    /// Delete rows whose check time is strictly older than now minus
    /// `retention_days`. Returns the number of deleted rows.
    async fn cleanup_old_data(&self, retention_days: u32) -> Result<u64>;
}

/// LibSQL-backed history store
pub struct LibsqlResultSink {
    pool: LibsqlPool,
    write_lock: Mutex<()>,
}

impl LibsqlResultSink {
    /// Wrap a pool and make sure the schema exists
    pub async fn new(pool: LibsqlPool) -> Result<Self> {
        let sink = Self { pool, write_lock: Mutex::new(()) };
        {
            let _guard = sink.write_lock.lock().await;
            let conn = sink.get_conn().await?;
            initialize_database(&conn).await?;
        }
        Ok(sink)
    }

    /// Get a connection from the pool
    async fn get_conn(&self) -> Result<deadpool::managed::Object<LibsqlManager>> {
        Ok(self.pool.get().await?)
    }

    /// Delete rows checked strictly before `cutoff`
    pub async fn cleanup_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let _guard = self.write_lock.lock().await;
        let conn = self.get_conn().await?;

        let deleted = conn
            .execute("DELETE FROM monitor_history WHERE check_time < ?", params![timestamp_to_i64(cutoff)])
            .await?;

        debug!(deleted, cutoff = %cutoff, "Pruned monitor history");
        Ok(deleted)
    }

    /// Newest rows for one target, most recent first
    pub async fn recent_results(&self, target_name: &str, limit: usize) -> Result<Vec<HistoryRecord>> {
        let conn = self.get_conn().await?;
        let mut stmt = conn
            .prepare(
                "SELECT id, db_name, status, response_time, error, check_time, created_at FROM monitor_history WHERE db_name = ? ORDER BY check_time DESC, id DESC LIMIT ?",
            )
            .await?;

        let mut rows = stmt.query(params![target_name, limit as i64]).await?;
        let mut results = Vec::new();

        while let Some(row) = rows.next().await? {
            let check_time: i64 = row.get(5)?;
            let created_at: i64 = row.get(6)?;

            results.push(HistoryRecord {
                id: row.get(0)?,
                target_name: row.get(1)?,
                status: row.get::<i64>(2)? != 0,
                response_time: row.get::<Option<f64>>(3)?,
                error: row.get::<Option<String>>(4)?,
                check_time: i64_to_timestamp(check_time),
                created_at: i64_to_timestamp(created_at),
            });
        }

        Ok(results)
    }
}

#[async_trait]
impl ResultSink for LibsqlResultSink {
    async fn save_result(&self, result: &MonitorResult) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let conn = self.get_conn().await?;

        conn.execute(
            "INSERT INTO monitor_history (db_name, status, response_time, error, check_time, created_at) VALUES (?, ?, ?, ?, ?, ?)",
            params![
                result.target_name.clone(),
                if result.status { 1 } else { 0 },
                result.response_time,
                result.error.clone(),
                timestamp_to_i64(result.check_time),
                timestamp_to_i64(Utc::now())
            ],
        )
        .await?;

        Ok(())
    }

    async fn cleanup_old_data(&self, retention_days: u32) -> Result<u64> {
        let cutoff = Duration::try_days(i64::from(retention_days))
            .and_then(|window| Utc::now().checked_sub_signed(window))
            .ok_or_else(|| anyhow!("retention window of {retention_days} days is out of range"))?;
        self.cleanup_before(cutoff).await
    }
}
