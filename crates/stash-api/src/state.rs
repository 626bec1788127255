use stash_core::Config;
use stash_services::{IngestionService, RecordStore, RetentionSweeper};
use std::sync::Arc;

/// Shared application state handed to every handler.
pub struct AppState {
    pub config: Config,
    pub store: RecordStore,
    pub ingestion: IngestionService,
    pub sweeper: Arc<RetentionSweeper>,
}

impl AppState {
    pub fn max_file_bytes(&self) -> u64 {
        self.store.max_bytes()
    }

    pub fn ttl_days(&self) -> i64 {
        self.config.ttl_days
    }
}
