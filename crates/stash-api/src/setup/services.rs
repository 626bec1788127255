use super::{database, storage};
use crate::state::AppState;
use anyhow::Result;
use stash_core::{Clock, Config};
use stash_services::{IngestionService, RecordStore, RetentionSweeper};
use std::sync::Arc;

/// Wire storage, index and services together.
///
/// The sweeper is constructed but not started; the caller decides when the
/// background task runs.
pub async fn initialize_services(config: &Config, clock: Arc<dyn Clock>) -> Result<Arc<AppState>> {
    let storage = storage::setup_storage(config).await?;
    let pool = database::setup_database(config).await?;

    let store = RecordStore::new(pool, storage, clock.clone(), config.max_file_bytes());

    let ingestion = IngestionService::new(store.clone());
    let sweeper = Arc::new(RetentionSweeper::new(
        store.clone(),
        clock,
        config.ttl(),
        config.cleanup_interval(),
    ));

    tracing::info!(
        max_file_mb = config.max_file_mb,
        ttl_days = config.ttl_days,
        cleanup_interval_secs = config.cleanup_interval_secs,
        "Services initialized"
    );

    Ok(Arc::new(AppState {
        config: config.clone(),
        store,
        ingestion,
        sweeper,
    }))
}
