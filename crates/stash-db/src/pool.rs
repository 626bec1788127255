//! SQLite pool setup for the metadata index.

use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use stash_core::AppError;
use std::path::Path;
use std::time::Duration;

/// Embedded schema migrations (workspace `migrations/`).
pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Open (creating if needed) the index at `path` and apply pending migrations.
pub async fn connect_index(path: &Path, max_connections: u32) -> Result<SqlitePool, AppError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    tracing::info!(path = %path.display(), "Opening metadata index...");

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Full)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect_with(options)
        .await?;

    MIGRATOR.run(&pool).await?;

    tracing::info!(max_connections, "Metadata index ready, migrations applied");

    Ok(pool)
}
