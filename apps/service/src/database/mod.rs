//! Persistence layer for probe results
//!
//! The monitoring core only sees the [`ResultSink`] trait; the libsql
//! implementation owns schema setup and write serialization.

pub mod migrations;
pub mod models;
pub mod repository;

pub use repository::{LibsqlResultSink, ResultSink};

use anyhow::Result;

/// Initialize database with schema
pub async fn initialize_database(conn: &libsql::Connection) -> Result<()> {
    migrations::run_migrations(conn).await
}
