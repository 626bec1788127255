#![allow(dead_code)]

use chrono::{Duration, Utc};
use stash_core::constants::INDEX_FILE;
use stash_core::{Clock, ManualClock};
use stash_db::{connect_index, RecordStore};
use stash_services::{IngestionService, LocalStorage, RetentionSweeper, UploadRequest};
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::io::AsyncRead;

pub const MAX_BYTES: u64 = 256 * 1024;
pub const TTL_DAYS: i64 = 14;

pub struct TestContext {
    pub dir: TempDir,
    pub clock: Arc<ManualClock>,
    pub store: RecordStore,
    pub ingestion: IngestionService,
    pub sweeper: Arc<RetentionSweeper>,
}

impl TestContext {
    pub fn blob_count(&self) -> usize {
        std::fs::read_dir(self.dir.path().join("blobs")).unwrap().count()
    }

    pub fn staging_count(&self) -> usize {
        std::fs::read_dir(self.dir.path().join("tmp")).unwrap().count()
    }
}

pub async fn setup() -> TestContext {
    setup_with_interval(std::time::Duration::from_secs(3600)).await
}

pub async fn setup_with_interval(interval: std::time::Duration) -> TestContext {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let store = open_store(dir.path(), clock.clone()).await;

    let sweeper = Arc::new(RetentionSweeper::new(
        store.clone(),
        clock.clone() as Arc<dyn Clock>,
        Duration::days(TTL_DAYS),
        interval,
    ));

    TestContext {
        ingestion: IngestionService::new(store.clone()),
        dir,
        clock,
        store,
        sweeper,
    }
}

pub async fn open_store(root: &Path, clock: Arc<ManualClock>) -> RecordStore {
    let storage = Arc::new(LocalStorage::new(root).await.unwrap());
    let pool = connect_index(&root.join(INDEX_FILE), 4).await.unwrap();
    RecordStore::new(pool, storage, clock, MAX_BYTES)
}

pub fn upload(data: Vec<u8>, name: &str) -> UploadRequest<'static> {
    UploadRequest {
        declared_size: Some(data.len() as u64),
        reader: reader(data),
        original_name: name.to_string(),
    }
}

pub fn reader(data: Vec<u8>) -> Pin<Box<dyn AsyncRead + Send>> {
    Box::pin(std::io::Cursor::new(data))
}

/// A PNG header followed by `len - 8` filler bytes.
pub fn png_bytes(len: usize) -> Vec<u8> {
    let mut data = b"\x89PNG\r\n\x1a\n".to_vec();
    data.resize(len.max(8), 0x42);
    data
}

/// A ZIP local file header followed by filler bytes.
pub fn zip_bytes(len: usize) -> Vec<u8> {
    let mut data = b"PK\x03\x04".to_vec();
    data.resize(len.max(4), 0x17);
    data
}
