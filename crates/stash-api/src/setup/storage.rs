use anyhow::{Context, Result};
use stash_core::Config;
use stash_storage::{LocalStorage, Storage};
use std::sync::Arc;

/// Create the blob and staging directories under the data root.
pub async fn setup_storage(config: &Config) -> Result<Arc<dyn Storage>> {
    let storage = LocalStorage::new(config.data_root())
        .await
        .context("Failed to initialize local storage")?;

    tracing::info!(root = %config.data_root().display(), "Local storage ready");

    Ok(Arc::new(storage))
}
