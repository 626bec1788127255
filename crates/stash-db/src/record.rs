use chrono::{DateTime, Utc};
use futures::stream::{BoxStream, StreamExt};
use sqlx::{Sqlite, SqlitePool};
use stash_core::{AppError, Clock, Record, RecordId, RecordKind};
use stash_storage::{BlobKey, BlobReader, Storage, StorageError, WriteLimits};
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncRead;
use tokio::sync::Mutex;

use crate::locks::KeyedLocks;

/// Attempts at finding an id that is neither live nor retired.
const ID_ALLOCATION_ATTEMPTS: usize = 4;

#[derive(Debug, sqlx::FromRow)]
struct RecordRow {
    id: String,
    kind: String,
    mime_type: String,
    size_bytes: i64,
    created_at_us: i64,
    original_name: String,
    storage_key: String,
}

impl RecordRow {
    fn into_record(self) -> Result<Record, AppError> {
        let id = RecordId::parse(&self.id)
            .ok_or_else(|| AppError::Internal(format!("Malformed record id in index: {}", self.id)))?;
        let kind = self
            .kind
            .parse::<RecordKind>()
            .map_err(|e| AppError::Internal(e.to_string()))?;
        let created_at = DateTime::<Utc>::from_timestamp_micros(self.created_at_us)
            .ok_or_else(|| AppError::Internal(format!("Invalid timestamp for record {}", self.id)))?;
        let size_bytes = u64::try_from(self.size_bytes)
            .map_err(|_| AppError::Internal(format!("Negative size for record {}", self.id)))?;

        Ok(Record {
            id,
            kind,
            mime_type: self.mime_type,
            size_bytes,
            created_at,
            original_name: self.original_name,
            storage_key: self.storage_key,
        })
    }
}

/// A record together with an open handle on its bytes.
#[derive(Debug)]
pub struct OpenedRecord {
    pub record: Record,
    pub blob: BlobReader,
}

/// Record repository
///
/// Coordinates the SQLite metadata index with blob storage so that callers
/// never observe metadata without bytes or bytes without metadata.
///
/// Locking: every operation touching a single id takes that id's lock from
/// [`KeyedLocks`] (shared for reads, exclusive for create and delete), and
/// every metadata mutation also holds the single writer mutex.
#[derive(Clone)]
pub struct RecordStore {
    pool: SqlitePool,
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
    locks: Arc<KeyedLocks>,
    writer: Arc<Mutex<()>>,
    max_bytes: u64,
}

impl RecordStore {
    pub fn new(
        pool: SqlitePool,
        storage: Arc<dyn Storage>,
        clock: Arc<dyn Clock>,
        max_bytes: u64,
    ) -> Self {
        Self {
            pool,
            storage,
            clock,
            locks: Arc::new(KeyedLocks::new()),
            writer: Arc::new(Mutex::new(())),
            max_bytes,
        }
    }

    /// Largest blob accepted by [`RecordStore::create`].
    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Store a new upload.
    ///
    /// Bytes are written and flushed before the metadata row is committed. If
    /// anything fails after the blob became visible, the blob is removed
    /// before the error is returned. Dropping the returned future while bytes
    /// are still streaming removes the staging file; once the blob is
    /// promoted the commit finishes regardless.
    #[tracing::instrument(
        skip(self, reader, original_name),
        fields(db.table = "records", db.operation = "insert", record.kind = %kind)
    )]
    pub async fn create(
        &self,
        kind: RecordKind,
        mime_type: &str,
        declared_size: Option<u64>,
        reader: Pin<Box<dyn AsyncRead + Send + '_>>,
        original_name: &str,
    ) -> Result<Record, AppError> {
        if let Some(declared) = declared_size {
            if declared > self.max_bytes {
                return Err(AppError::QuotaExceeded {
                    limit: self.max_bytes,
                });
            }
        }

        let start = Instant::now();
        let id = self.allocate_id().await?;
        let key = BlobKey::for_record(&id);

        // Held until the row is committed so orphan reclamation cannot see
        // the promoted blob before its metadata exists.
        let guard = self.locks.write(id.as_str()).await;

        let limits = WriteLimits {
            max_bytes: self.max_bytes,
            expected_len: declared_size,
        };
        let size_bytes = self.storage.put_stream(&key, reader, limits).await?;

        // The index keeps microseconds; truncate so the returned record
        // compares equal to what a later lookup yields.
        let now = self.clock.now();
        let created_at = DateTime::<Utc>::from_timestamp_micros(now.timestamp_micros()).unwrap_or(now);

        let record = Record {
            id: id.clone(),
            kind,
            mime_type: mime_type.to_string(),
            size_bytes,
            created_at,
            original_name: original_name.to_string(),
            storage_key: key.to_string(),
        };

        // A queued INSERT still lands after its future is dropped, so the
        // commit and any blob cleanup run to completion on their own task.
        let store = self.clone();
        let record = tokio::spawn(async move {
            let _guard = guard;
            store.commit(record).await
        })
        .await
        .map_err(|e| AppError::Internal(format!("Metadata commit task failed: {}", e)))??;

        tracing::info!(
            record_id = %record.id,
            size_bytes = record.size_bytes,
            mime_type = %record.mime_type,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Record created"
        );

        Ok(record)
    }

    async fn allocate_id(&self) -> Result<RecordId, AppError> {
        for _ in 0..ID_ALLOCATION_ATTEMPTS {
            let id = RecordId::generate();
            let retired: bool = sqlx::query_scalar::<Sqlite, bool>(
                "SELECT EXISTS(SELECT 1 FROM retired_records WHERE id = ?)",
            )
            .bind(id.as_str())
            .fetch_one(&self.pool)
            .await?;

            // Every live id has a blob, so checking storage covers live ids as
            // well as orphans awaiting reclamation.
            if !retired && !self.storage.exists(&BlobKey::for_record(&id)).await? {
                return Ok(id);
            }
            tracing::warn!(record_id = %id, "Generated id already in use, retrying");
        }

        Err(AppError::Internal(
            "Could not allocate an unused record id".to_string(),
        ))
    }

    /// Commit the row for an already promoted blob, removing the blob if the
    /// commit fails.
    async fn commit(&self, record: Record) -> Result<Record, AppError> {
        if let Err(e) = self.insert(&record).await {
            let key = BlobKey::for_record(&record.id);
            if let Err(cleanup) = self.storage.delete(&key).await {
                tracing::error!(
                    error = %cleanup,
                    record_id = %record.id,
                    "Failed to remove blob after metadata commit failure"
                );
            }
            return Err(e);
        }
        Ok(record)
    }

    async fn insert(&self, record: &Record) -> Result<(), AppError> {
        let size_bytes = i64::try_from(record.size_bytes)
            .map_err(|_| AppError::Internal("Record size out of range".to_string()))?;

        let _writer = self.writer.lock().await;
        let inserted = sqlx::query(
            r#"
            INSERT INTO records (id, kind, mime_type, size_bytes, created_at_us, original_name, storage_key)
            SELECT ?, ?, ?, ?, ?, ?, ?
            WHERE NOT EXISTS (SELECT 1 FROM retired_records WHERE id = ?)
            "#,
        )
        .bind(record.id.as_str())
        .bind(record.kind.as_str())
        .bind(&record.mime_type)
        .bind(size_bytes)
        .bind(record.created_at.timestamp_micros())
        .bind(&record.original_name)
        .bind(&record.storage_key)
        .bind(record.id.as_str())
        .execute(&self.pool)
        .await?
        .rows_affected();

        if inserted != 1 {
            return Err(AppError::Internal(format!(
                "Record id {} was retired during upload",
                record.id
            )));
        }

        Ok(())
    }

    /// Look up a single record.
    #[tracing::instrument(skip(self), fields(db.table = "records", db.operation = "select", record_id = %id))]
    pub async fn get(&self, id: &RecordId) -> Result<Record, AppError> {
        let row = sqlx::query_as::<Sqlite, RecordRow>(
            "SELECT id, kind, mime_type, size_bytes, created_at_us, original_name, storage_key \
             FROM records WHERE id = ?",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row.into_record(),
            None => Err(AppError::NotFound("Record not found".to_string())),
        }
    }

    /// Open a record's bytes for reading.
    ///
    /// The returned handle keeps delivering the full content even if the
    /// record is deleted while it is being read.
    #[tracing::instrument(skip(self), fields(record_id = %id))]
    pub async fn open(&self, id: &RecordId) -> Result<OpenedRecord, AppError> {
        let _guard = self.locks.read(id.as_str()).await;

        let record = self.get(id).await?;
        let blob = match self.storage.open(&BlobKey::for_record(id)).await {
            Ok(blob) => blob,
            Err(StorageError::NotFound(_)) => {
                tracing::error!(record_id = %id, "Record has metadata but no blob");
                return Err(AppError::NotFound("Record not found".to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        Ok(OpenedRecord { record, blob })
    }

    /// Records of one kind, most recent first.
    pub fn list(&self, kind: RecordKind) -> BoxStream<'_, Result<Record, AppError>> {
        sqlx::query_as::<Sqlite, RecordRow>(
            "SELECT id, kind, mime_type, size_bytes, created_at_us, original_name, storage_key \
             FROM records WHERE kind = ? ORDER BY created_at_us DESC, seq DESC",
        )
        .bind(kind.as_str())
        .fetch(&self.pool)
        .map(|row| row.map_err(AppError::from).and_then(RecordRow::into_record))
        .boxed()
    }

    /// Every record, most recent first.
    pub fn list_all(&self) -> BoxStream<'_, Result<Record, AppError>> {
        sqlx::query_as::<Sqlite, RecordRow>(
            "SELECT id, kind, mime_type, size_bytes, created_at_us, original_name, storage_key \
             FROM records ORDER BY created_at_us DESC, seq DESC",
        )
        .fetch(&self.pool)
        .map(|row| row.map_err(AppError::from).and_then(RecordRow::into_record))
        .boxed()
    }

    /// Delete a record. Returns `false` if no live record had this id.
    ///
    /// The metadata row is removed (and the id retired) before the blob is
    /// unlinked, and both happen while no reader holds the id's lock.
    #[tracing::instrument(skip(self), fields(db.table = "records", db.operation = "delete", record_id = %id))]
    pub async fn delete(&self, id: &RecordId) -> Result<bool, AppError> {
        let _guard = self.locks.write(id.as_str()).await;

        {
            let _writer = self.writer.lock().await;
            let mut tx = self.pool.begin().await?;

            let removed = sqlx::query("DELETE FROM records WHERE id = ?")
                .bind(id.as_str())
                .execute(&mut *tx)
                .await?
                .rows_affected();

            if removed == 0 {
                tx.rollback().await?;
                return Ok(false);
            }

            sqlx::query("INSERT OR IGNORE INTO retired_records (id, retired_at_us) VALUES (?, ?)")
                .bind(id.as_str())
                .bind(self.clock.now().timestamp_micros())
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;
        }

        let key = BlobKey::for_record(id);
        match self.storage.delete(&key).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(record_id = %id, "Blob was already missing during delete");
            }
            Err(e) => {
                // The row is gone; the leftover blob is reclaimed as an orphan.
                tracing::error!(
                    error = %e,
                    record_id = %id,
                    "Failed to delete blob, leaving it for orphan reclamation"
                );
            }
        }

        tracing::debug!(record_id = %id, "Record deleted");
        Ok(true)
    }

    /// Remove the blob for `id` if no metadata row refers to it.
    ///
    /// Returns `true` if a blob was removed.
    pub async fn reclaim_if_orphan(&self, id: &RecordId) -> Result<bool, AppError> {
        let _guard = self.locks.write(id.as_str()).await;

        let live: bool =
            sqlx::query_scalar::<Sqlite, bool>("SELECT EXISTS(SELECT 1 FROM records WHERE id = ?)")
                .bind(id.as_str())
                .fetch_one(&self.pool)
                .await?;
        if live {
            return Ok(false);
        }

        let removed = self.storage.delete(&BlobKey::for_record(id)).await?;
        if removed {
            tracing::info!(record_id = %id, "Removed orphaned blob");
        }
        Ok(removed)
    }

    /// Reclaim every blob without a metadata row.
    #[tracing::instrument(skip(self))]
    pub async fn reclaim_orphans(&self) -> Result<usize, AppError> {
        let keys = self.storage.list_keys().await?;
        let mut removed = 0;

        for key in keys {
            match self.reclaim_if_orphan(key.record_id()).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(error = %e, key = %key, "Failed to reclaim orphaned blob");
                }
            }
        }

        Ok(removed)
    }

    /// Remove abandoned staging files older than `older_than`.
    pub async fn purge_staging(&self, older_than: Duration) -> Result<usize, AppError> {
        Ok(self.storage.purge_staging(older_than).await?)
    }

    /// Number of live records of `kind`.
    pub async fn count(&self, kind: RecordKind) -> Result<u64, AppError> {
        let count: i64 = sqlx::query_scalar::<Sqlite, i64>("SELECT COUNT(*) FROM records WHERE kind = ?")
            .bind(kind.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    /// Sum of `size_bytes` over all live records.
    pub async fn total_bytes(&self) -> Result<u64, AppError> {
        let total: i64 =
            sqlx::query_scalar::<Sqlite, i64>("SELECT COALESCE(SUM(size_bytes), 0) FROM records")
                .fetch_one(&self.pool)
                .await?;
        Ok(total.max(0) as u64)
    }
}
