use chrono::{Duration, Utc};
use futures::TryStreamExt;
use stash_core::constants::{BLOBS_DIR, INDEX_FILE, STAGING_DIR};
use stash_core::{AppError, ManualClock, RecordKind};
use stash_db::{connect_index, RecordStore};
use stash_storage::{BlobKey, LocalStorage, Storage, WriteLimits};
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use tempfile::TempDir;
use std::time::{Duration as StdDuration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

const MAX_BYTES: u64 = 64 * 1024;

struct Harness {
    dir: TempDir,
    clock: Arc<ManualClock>,
    store: RecordStore,
}

async fn open_store(root: &Path, clock: Arc<ManualClock>) -> RecordStore {
    let storage = Arc::new(LocalStorage::new(root).await.unwrap());
    let pool = connect_index(&root.join(INDEX_FILE), 4).await.unwrap();
    RecordStore::new(pool, storage, clock, MAX_BYTES)
}

async fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::default());
    let store = open_store(dir.path(), clock.clone()).await;
    Harness { dir, clock, store }
}

fn reader(data: Vec<u8>) -> Pin<Box<dyn AsyncRead + Send>> {
    Box::pin(std::io::Cursor::new(data))
}

fn dir_entries(path: &Path) -> usize {
    std::fs::read_dir(path).unwrap().count()
}

async fn read_back(store: &RecordStore, id: &stash_core::RecordId) -> Vec<u8> {
    let mut opened = store.open(id).await.unwrap();
    let mut out = Vec::new();
    opened.blob.reader.read_to_end(&mut out).await.unwrap();
    out
}

#[tokio::test]
async fn test_round_trip_at_size_boundaries() {
    let h = harness().await;

    for len in [0usize, 1, MAX_BYTES as usize] {
        let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        let record = h
            .store
            .create(
                RecordKind::File,
                "application/zip",
                Some(len as u64),
                reader(data.clone()),
                "payload.zip",
            )
            .await
            .unwrap();

        assert_eq!(record.size_bytes, len as u64);
        assert_eq!(read_back(&h.store, &record.id).await, data);
        assert_eq!(h.store.get(&record.id).await.unwrap(), record);
    }
}

#[tokio::test]
async fn test_one_byte_over_limit_is_rejected_without_residue() {
    let h = harness().await;

    let result = h
        .store
        .create(
            RecordKind::File,
            "application/zip",
            None,
            reader(vec![0u8; MAX_BYTES as usize + 1]),
            "big.zip",
        )
        .await;

    assert!(matches!(result, Err(AppError::QuotaExceeded { limit }) if limit == MAX_BYTES));
    assert_eq!(dir_entries(&h.dir.path().join(BLOBS_DIR)), 0);
    assert_eq!(dir_entries(&h.dir.path().join(STAGING_DIR)), 0);
    assert_eq!(h.store.count(RecordKind::File).await.unwrap(), 0);
}

#[tokio::test]
async fn test_declared_size_over_limit_is_rejected_up_front() {
    let h = harness().await;

    let result = h
        .store
        .create(
            RecordKind::Image,
            "image/png",
            Some(MAX_BYTES + 1),
            reader(Vec::new()),
            "huge.png",
        )
        .await;

    assert!(matches!(result, Err(AppError::QuotaExceeded { .. })));
}

#[tokio::test]
async fn test_truncated_stream_is_a_storage_error() {
    let h = harness().await;

    let result = h
        .store
        .create(
            RecordKind::Image,
            "image/png",
            Some(100),
            reader(vec![1u8; 40]),
            "cut.png",
        )
        .await;

    assert!(matches!(result, Err(AppError::Storage(_))));
    assert_eq!(dir_entries(&h.dir.path().join(BLOBS_DIR)), 0);
}

#[tokio::test]
async fn test_concurrent_creates_get_distinct_ids() {
    let h = harness().await;
    let mut tasks = Vec::new();

    for i in 0..16u8 {
        let store = h.store.clone();
        tasks.push(tokio::spawn(async move {
            let data = vec![i; 128 + i as usize];
            let record = store
                .create(RecordKind::File, "application/zip", None, reader(data.clone()), "a.zip")
                .await
                .unwrap();
            (record.id, data)
        }));
    }

    let mut ids = std::collections::HashSet::new();
    for task in tasks {
        let (id, data) = task.await.unwrap();
        assert_eq!(read_back(&h.store, &id).await, data);
        assert!(ids.insert(id));
    }
    assert_eq!(ids.len(), 16);
    assert_eq!(h.store.count(RecordKind::File).await.unwrap(), 16);
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let h = harness().await;
    let record = h
        .store
        .create(RecordKind::Image, "image/gif", None, reader(b"GIF89a".to_vec()), "x.gif")
        .await
        .unwrap();

    assert!(h.store.delete(&record.id).await.unwrap());
    assert!(!h.store.delete(&record.id).await.unwrap());
    assert!(matches!(
        h.store.get(&record.id).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        h.store.open(&record.id).await,
        Err(AppError::NotFound(_))
    ));
    assert_eq!(dir_entries(&h.dir.path().join(BLOBS_DIR)), 0);
}

#[tokio::test]
async fn test_list_is_most_recent_first() {
    let h = harness().await;
    let mut created = Vec::new();

    for name in ["a.png", "b.png", "c.png"] {
        let record = h
            .store
            .create(RecordKind::Image, "image/png", None, reader(vec![1, 2, 3]), name)
            .await
            .unwrap();
        created.push(record.id);
        h.clock.advance(Duration::seconds(1));
    }
    h.store
        .create(RecordKind::File, "application/zip", None, reader(vec![4]), "d.zip")
        .await
        .unwrap();

    let listed: Vec<_> = h
        .store
        .list(RecordKind::Image)
        .map_ok(|record| record.id)
        .try_collect()
        .await
        .unwrap();

    created.reverse();
    assert_eq!(listed, created);

    let all: Vec<_> = h.store.list_all().try_collect().await.unwrap();
    assert_eq!(all.len(), 4);
    assert_eq!(all[0].kind, RecordKind::File);
}

#[tokio::test]
async fn test_list_breaks_timestamp_ties_by_insertion_order() {
    let h = harness().await;
    let mut created = Vec::new();

    for _ in 0..3 {
        let record = h
            .store
            .create(RecordKind::File, "application/x-tar", None, reader(vec![0]), "t.tar")
            .await
            .unwrap();
        created.push(record.id);
    }

    let listed: Vec<_> = h
        .store
        .list(RecordKind::File)
        .map_ok(|record| record.id)
        .try_collect()
        .await
        .unwrap();

    created.reverse();
    assert_eq!(listed, created);
}

#[tokio::test]
async fn test_open_handle_outlives_delete() {
    let h = harness().await;
    let data = vec![5u8; 32 * 1024];
    let record = h
        .store
        .create(RecordKind::File, "application/zip", None, reader(data.clone()), "x.zip")
        .await
        .unwrap();

    let mut opened = h.store.open(&record.id).await.unwrap();
    assert!(h.store.delete(&record.id).await.unwrap());

    let mut out = Vec::new();
    opened.blob.reader.read_to_end(&mut out).await.unwrap();
    assert_eq!(out, data);
    assert!(matches!(
        h.store.open(&record.id).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_records_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(Utc::now() - Duration::days(3)));

    let record = {
        let store = open_store(dir.path(), clock.clone()).await;
        let record = store
            .create(RecordKind::Image, "image/webp", None, reader(vec![9; 10]), "w.webp")
            .await
            .unwrap();
        store.pool().close().await;
        record
    };

    let reopened = open_store(dir.path(), clock).await;
    assert_eq!(reopened.get(&record.id).await.unwrap(), record);
    assert_eq!(read_back(&reopened, &record.id).await, vec![9; 10]);
}

#[tokio::test]
async fn test_failed_metadata_commit_removes_blob() {
    let h = harness().await;
    sqlx::query("DROP TABLE records")
        .execute(h.store.pool())
        .await
        .unwrap();

    let result = h
        .store
        .create(RecordKind::Image, "image/png", None, reader(vec![1; 16]), "p.png")
        .await;

    assert!(matches!(result, Err(AppError::Database(_))));
    assert_eq!(dir_entries(&h.dir.path().join(BLOBS_DIR)), 0);
    assert_eq!(dir_entries(&h.dir.path().join(STAGING_DIR)), 0);
}

#[tokio::test]
async fn test_cancelled_create_while_streaming_leaves_nothing() {
    let h = harness().await;
    // The client end stays open, so the upload never finishes on its own.
    let (mut client, server) = tokio::io::duplex(64);
    client.write_all(&[7; 16]).await.unwrap();

    let result = tokio::time::timeout(
        StdDuration::from_millis(100),
        h.store
            .create(RecordKind::Image, "image/png", None, Box::pin(server), "slow.png"),
    )
    .await;
    assert!(result.is_err());
    drop(client);

    assert_eq!(dir_entries(&h.dir.path().join(STAGING_DIR)), 0);
    assert_eq!(dir_entries(&h.dir.path().join(BLOBS_DIR)), 0);
    assert_eq!(h.store.count(RecordKind::Image).await.unwrap(), 0);
}

#[tokio::test]
async fn test_cancel_during_metadata_commit_keeps_record_and_blob_together() {
    let h = harness().await;

    // Hold the write lock on the index so the INSERT queues behind it.
    let mut blocker = h.store.pool().acquire().await.unwrap();
    sqlx::query("BEGIN IMMEDIATE")
        .execute(&mut *blocker)
        .await
        .unwrap();

    let result = tokio::time::timeout(
        StdDuration::from_millis(300),
        h.store
            .create(RecordKind::Image, "image/png", None, reader(vec![3; 8]), "late.png"),
    )
    .await;
    assert!(result.is_err());
    assert_eq!(dir_entries(&h.dir.path().join(BLOBS_DIR)), 1);

    sqlx::query("ROLLBACK")
        .execute(&mut *blocker)
        .await
        .unwrap();
    drop(blocker);

    let deadline = Instant::now() + StdDuration::from_secs(5);
    while h.store.count(RecordKind::Image).await.unwrap() == 0 {
        assert!(Instant::now() < deadline, "commit never landed");
        tokio::time::sleep(StdDuration::from_millis(20)).await;
    }

    let records: Vec<_> = h
        .store
        .list(RecordKind::Image)
        .try_collect()
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(dir_entries(&h.dir.path().join(BLOBS_DIR)), 1);
    assert_eq!(read_back(&h.store, &records[0].id).await, vec![3; 8]);

    // Orphan reclamation must not take the committed blob.
    assert_eq!(h.store.reclaim_orphans().await.unwrap(), 0);
    assert_eq!(read_back(&h.store, &records[0].id).await, vec![3; 8]);
}

#[tokio::test]
async fn test_orphan_blobs_are_reclaimed() {
    let h = harness().await;
    let storage = LocalStorage::new(h.dir.path()).await.unwrap();

    let live = h
        .store
        .create(RecordKind::Image, "image/png", None, reader(vec![1; 4]), "live.png")
        .await
        .unwrap();

    let orphan = BlobKey::for_record(&stash_core::RecordId::generate());
    storage
        .put_stream(
            &orphan,
            reader(vec![2; 4]),
            WriteLimits {
                max_bytes: MAX_BYTES,
                expected_len: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(h.store.reclaim_orphans().await.unwrap(), 1);
    assert!(!storage.exists(&orphan).await.unwrap());
    assert_eq!(read_back(&h.store, &live.id).await, vec![1; 4]);
}

#[tokio::test]
async fn test_statistics() {
    let h = harness().await;
    h.store
        .create(RecordKind::Image, "image/png", None, reader(vec![0; 10]), "a.png")
        .await
        .unwrap();
    h.store
        .create(RecordKind::File, "application/zip", None, reader(vec![0; 5]), "b.zip")
        .await
        .unwrap();

    assert_eq!(h.store.count(RecordKind::Image).await.unwrap(), 1);
    assert_eq!(h.store.count(RecordKind::File).await.unwrap(), 1);
    assert_eq!(h.store.total_bytes().await.unwrap(), 15);
}
