//! Storage abstraction trait
//!
//! This module defines the Storage trait that blob backends implement.

use crate::keys::BlobKey;
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use stash_core::AppError;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncRead;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Upload exceeds limit of {limit} bytes")]
    LimitExceeded { limit: u64 },

    #[error("Upload truncated: expected {expected} bytes, received {actual}")]
    Truncated { expected: u64, actual: u64 },

    #[error("Blob already exists: {0}")]
    AlreadyExists(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::LimitExceeded { limit } => AppError::QuotaExceeded { limit },
            StorageError::NotFound(msg) => AppError::NotFound(msg),
            other => AppError::Storage(other.to_string()),
        }
    }
}

/// Bounds applied while a blob is being written.
#[derive(Debug, Clone, Copy)]
pub struct WriteLimits {
    /// Hard cap on stored bytes.
    pub max_bytes: u64,
    /// Length announced by the client. Fewer bytes than this means the
    /// stream was cut short.
    pub expected_len: Option<u64>,
}

/// An open, readable blob.
///
/// The handle keeps reading the content it was opened on even if the blob is
/// deleted afterwards.
pub struct BlobReader {
    pub reader: Pin<Box<dyn AsyncRead + Send>>,
    pub len: u64,
}

impl BlobReader {
    /// Chunked stream of the blob content.
    pub fn into_stream(self) -> Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>> {
        let stream = tokio_util::io::ReaderStream::new(self.reader)
            .map(|chunk| chunk.map_err(StorageError::IoError));
        Box::pin(stream)
    }
}

impl std::fmt::Debug for BlobReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobReader").field("len", &self.len).finish()
    }
}

/// Blob storage abstraction
///
/// A blob written through [`Storage::put_stream`] becomes visible at its key
/// only once every byte has been written and flushed; a failed or cancelled
/// write leaves nothing behind at the key.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Write a stream to `key`, returning the number of bytes stored.
    ///
    /// Never overwrites an existing blob.
    async fn put_stream<'a>(
        &self,
        key: &BlobKey,
        reader: Pin<Box<dyn AsyncRead + Send + 'a>>,
        limits: WriteLimits,
    ) -> StorageResult<u64>;

    /// Open a blob for reading.
    async fn open(&self, key: &BlobKey) -> StorageResult<BlobReader>;

    /// Delete a blob. Returns `false` if it did not exist.
    async fn delete(&self, key: &BlobKey) -> StorageResult<bool>;

    /// Check if a blob exists
    async fn exists(&self, key: &BlobKey) -> StorageResult<bool>;

    /// Every committed blob key currently present.
    async fn list_keys(&self) -> StorageResult<Vec<BlobKey>>;

    /// Remove abandoned in-progress uploads older than `older_than`.
    async fn purge_staging(&self, older_than: Duration) -> StorageResult<usize>;
}
