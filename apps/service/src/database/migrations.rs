use anyhow::Result;
use libsql::Connection;

/// Schema version - increment when making schema changes
const SCHEMA_VERSION: i32 = 2;

/// Run database migrations
///
/// This is the single source of truth for the history schema.
pub async fn run_migrations(conn: &Connection) -> Result<()> {
    // Create schema_migrations table first (tracks applied migrations)
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL,
            description TEXT
        )",
        (),
    )
    .await?;

    let current_version = get_current_version(conn).await?;

    if current_version >= SCHEMA_VERSION {
        tracing::debug!("Database schema is up to date (version {})", current_version);
        return Ok(());
    }

    tracing::info!("Running migrations from version {} to {}", current_version, SCHEMA_VERSION);

    if current_version < 1 {
        run_migration_v1(conn).await?;
        record_migration(conn, 1, "Monitor history table").await?;
    }

    if current_version < 2 {
        run_migration_v2(conn).await?;
        record_migration(conn, 2, "Millisecond timestamps").await?;
    }

    tracing::info!("Database migrations completed successfully (now at version {})", SCHEMA_VERSION);
    Ok(())
}

/// Get current schema version from database
pub async fn get_current_version(conn: &Connection) -> Result<i32> {
    let mut rows = conn.query("SELECT MAX(version) FROM schema_migrations", ()).await?;

    if let Some(row) = rows.next().await? {
        let version: Option<i32> = row.get(0)?;
        Ok(version.unwrap_or(0))
    } else {
        Ok(0)
    }
}

/// Record that a migration was applied
async fn record_migration(conn: &Connection, version: i32, description: &str) -> Result<()> {
    let now = chrono::Utc::now().timestamp();

    conn.execute(
        "INSERT INTO schema_migrations (version, applied_at, description) VALUES (?, ?, ?)",
        libsql::params![version, now, description],
    )
    .await?;

    tracing::info!("Applied migration v{}: {}", version, description);
    Ok(())
}

/// Migration v1: append-only probe history
async fn run_migration_v1(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS monitor_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            db_name TEXT NOT NULL,
            status INTEGER NOT NULL,
            response_time REAL,
            error TEXT,
            check_time INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        )",
        (),
    )
    .await?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_monitor_history_db_name ON monitor_history(db_name)",
        (),
    )
    .await?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_monitor_history_check_time ON monitor_history(check_time)",
        (),
    )
    .await?;

    Ok(())
}

/// Migration v2: `check_time` and `created_at` move from unix seconds to
/// unix milliseconds
async fn run_migration_v2(conn: &Connection) -> Result<()> {
    conn.execute(
        "UPDATE monitor_history SET check_time = check_time * 1000, created_at = created_at * 1000",
        (),
    )
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn connection() -> (tempfile::TempDir, libsql::Database, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let db = libsql::Builder::new_local(dir.path().join("migrations.db")).build().await.unwrap();
        let conn = db.connect().unwrap();
        (dir, db, conn)
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let (_dir, _db, conn) = connection().await;

        run_migrations(&conn).await.unwrap();
        run_migrations(&conn).await.unwrap();

        assert_eq!(get_current_version(&conn).await.unwrap(), SCHEMA_VERSION);

        let mut rows = conn.query("SELECT COUNT(*) FROM schema_migrations", ()).await.unwrap();
        let count: i64 = rows.next().await.unwrap().unwrap().get(0).unwrap();
        assert_eq!(count, i64::from(SCHEMA_VERSION));
    }

    #[tokio::test]
    async fn second_timestamps_are_upgraded_to_millis() {
        let (_dir, _db, conn) = connection().await;
        conn.execute(
            "CREATE TABLE schema_migrations (version INTEGER PRIMARY KEY, applied_at INTEGER NOT NULL, description TEXT)",
            (),
        )
        .await
        .unwrap();
        run_migration_v1(&conn).await.unwrap();
        record_migration(&conn, 1, "Monitor history table").await.unwrap();
        conn.execute(
            "INSERT INTO monitor_history (db_name, status, check_time, created_at) VALUES ('orders', 1, 1700000000, 1700000001)",
            (),
        )
        .await
        .unwrap();

        run_migrations(&conn).await.unwrap();

        let mut rows = conn.query("SELECT check_time, created_at FROM monitor_history", ()).await.unwrap();
        let row = rows.next().await.unwrap().unwrap();
        assert_eq!(row.get::<i64>(0).unwrap(), 1_700_000_000_000);
        assert_eq!(row.get::<i64>(1).unwrap(), 1_700_000_001_000);
        assert_eq!(get_current_version(&conn).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn creates_history_indexes() {
        let (_dir, _db, conn) = connection().await;
        run_migrations(&conn).await.unwrap();

        let mut rows = conn
            .query(
                "SELECT name FROM sqlite_master WHERE type = 'index' AND tbl_name = 'monitor_history' ORDER BY name",
                (),
            )
            .await
            .unwrap();

        let mut names = Vec::new();
        while let Some(row) = rows.next().await.unwrap() {
            names.push(row.get::<String>(0).unwrap());
        }
        assert_eq!(names, vec!["idx_monitor_history_check_time", "idx_monitor_history_db_name"]);
    }
}
