use crate::keys::BlobKey;
use crate::traits::{BlobReader, Storage, StorageError, StorageResult, WriteLimits};
use async_trait::async_trait;
use stash_core::constants::{BLOBS_DIR, STAGING_DIR};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::time::{Duration, SystemTime};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

/// Local filesystem storage implementation
#[derive(Clone, Debug)]
pub struct LocalStorage {
    blobs_dir: PathBuf,
    staging_dir: PathBuf,
}

/// A staging file that is removed again unless it was promoted.
///
/// Dropping the guard (error path or a cancelled upload future) deletes the
/// partial file synchronously.
struct StagingFile {
    path: PathBuf,
    promoted: bool,
}

impl StagingFile {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            promoted: false,
        }
    }
}

impl Drop for StagingFile {
    fn drop(&mut self) {
        if self.promoted {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != ErrorKind::NotFound {
                tracing::warn!(
                    error = %e,
                    path = %self.path.display(),
                    "Failed to remove staging file"
                );
            }
        }
    }
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `root` - Data root; blobs and staging directories are created below it
    pub async fn new(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        let blobs_dir = root.join(BLOBS_DIR);
        let staging_dir = root.join(STAGING_DIR);

        for dir in [&blobs_dir, &staging_dir] {
            fs::create_dir_all(dir).await.map_err(|e| {
                StorageError::ConfigError(format!(
                    "Failed to create storage directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        }

        Ok(LocalStorage {
            blobs_dir,
            staging_dir,
        })
    }

    fn key_to_path(&self, key: &BlobKey) -> PathBuf {
        self.blobs_dir.join(key.file_name())
    }

    fn staging_path(&self) -> PathBuf {
        let suffix: [u8; 8] = rand::random();
        self.staging_dir
            .join(format!("{}.part", hex::encode(suffix)))
    }

    /// Flush the directory entry so a rename survives a crash.
    async fn sync_dir(dir: &Path) {
        match fs::File::open(dir).await {
            Ok(handle) => {
                if let Err(e) = handle.sync_all().await {
                    tracing::debug!(error = %e, dir = %dir.display(), "Directory sync not supported");
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, dir = %dir.display(), "Failed to open directory for sync");
            }
        }
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn put_stream<'a>(
        &self,
        key: &BlobKey,
        reader: Pin<Box<dyn AsyncRead + Send + 'a>>,
        limits: WriteLimits,
    ) -> StorageResult<u64> {
        let path = self.key_to_path(key);
        let start = std::time::Instant::now();

        let mut staging = StagingFile::new(self.staging_path());

        let mut file = fs::File::create(&staging.path).await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to create staging file {}: {}",
                staging.path.display(),
                e
            ))
        })?;

        // One byte past the limit is enough to know the limit was crossed.
        let mut limited = reader.take(limits.max_bytes.saturating_add(1));
        let bytes_copied = tokio::io::copy(&mut limited, &mut file)
            .await
            .map_err(|e| {
                StorageError::UploadFailed(format!(
                    "Failed to write stream to {}: {}",
                    staging.path.display(),
                    e
                ))
            })?;

        if bytes_copied > limits.max_bytes {
            return Err(StorageError::LimitExceeded {
                limit: limits.max_bytes,
            });
        }

        if let Some(expected) = limits.expected_len {
            if bytes_copied != expected {
                return Err(StorageError::Truncated {
                    expected,
                    actual: bytes_copied,
                });
            }
        }

        file.flush().await?;
        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to sync staging file {}: {}",
                staging.path.display(),
                e
            ))
        })?;
        drop(file);

        // hard_link refuses to replace an existing blob, unlike rename.
        fs::hard_link(&staging.path, &path).await.map_err(|e| {
            if e.kind() == ErrorKind::AlreadyExists {
                StorageError::AlreadyExists(key.to_string())
            } else {
                StorageError::UploadFailed(format!(
                    "Failed to promote staging file to {}: {}",
                    path.display(),
                    e
                ))
            }
        })?;
        fs::remove_file(&staging.path).await?;
        staging.promoted = true;
        Self::sync_dir(&self.blobs_dir).await;

        tracing::info!(
            path = %path.display(),
            key = %key,
            size_bytes = bytes_copied,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage stream upload successful"
        );

        Ok(bytes_copied)
    }

    async fn open(&self, key: &BlobKey) -> StorageResult<BlobReader> {
        let path = self.key_to_path(key);

        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => return Err(StorageError::IoError(e)),
        };
        let len = file.metadata().await?.len();

        tracing::debug!(key = %key, size_bytes = len, "Local storage blob opened");

        Ok(BlobReader {
            reader: Box::pin(file),
            len,
        })
    }

    async fn delete(&self, key: &BlobKey) -> StorageResult<bool> {
        let path = self.key_to_path(key);
        let start = std::time::Instant::now();

        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => {
                return Err(StorageError::DeleteFailed(format!(
                    "Failed to delete file {}: {}",
                    path.display(),
                    e
                )))
            }
        }

        tracing::info!(
            path = %path.display(),
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage delete successful"
        );

        Ok(true)
    }

    async fn exists(&self, key: &BlobKey) -> StorageResult<bool> {
        Ok(fs::try_exists(self.key_to_path(key)).await?)
    }

    async fn list_keys(&self) -> StorageResult<Vec<BlobKey>> {
        let mut keys = Vec::new();
        let mut entries = fs::read_dir(&self.blobs_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            match BlobKey::parse(&format!("{}/{}", BLOBS_DIR, name)) {
                Some(key) => keys.push(key),
                None => {
                    tracing::debug!(name = %name, "Ignoring unrecognised file in blob directory");
                }
            }
        }

        Ok(keys)
    }

    async fn purge_staging(&self, older_than: Duration) -> StorageResult<usize> {
        let cutoff = SystemTime::now()
            .checked_sub(older_than)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let mut removed = 0;
        let mut entries = fs::read_dir(&self.staging_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let meta = match entry.metadata().await {
                Ok(meta) => meta,
                // Finished and cleaned up by its owner in the meantime.
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(StorageError::IoError(e)),
            };
            if !meta.is_file() {
                continue;
            }
            let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            if modified > cutoff {
                continue;
            }
            match fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(StorageError::IoError(e)),
            }
        }

        if removed > 0 {
            tracing::info!(removed, "Removed abandoned staging files");
        }

        Ok(removed)
    }
}
