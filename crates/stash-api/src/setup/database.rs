use anyhow::{Context, Result};
use stash_core::Config;
use stash_db::{connect_index, SqlitePool};

pub async fn setup_database(config: &Config) -> Result<SqlitePool> {
    connect_index(&config.index_path(), config.db_max_connections)
        .await
        .context("Failed to open metadata index")
}
