use stash_core::constants::SNIFF_LEN;
use stash_core::{AppError, Record};
use stash_db::RecordStore;
use stash_processing::{classify, sanitize_original_name, Classification};
use std::pin::Pin;
use tokio::io::{AsyncRead, AsyncReadExt};

/// One upload as handed over by the transport layer.
pub struct UploadRequest<'a> {
    pub reader: Pin<Box<dyn AsyncRead + Send + 'a>>,
    /// Size announced by the client, if any.
    pub declared_size: Option<u64>,
    /// Client supplied filename. Display metadata only.
    pub original_name: String,
}

impl std::fmt::Debug for UploadRequest<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadRequest")
            .field("declared_size", &self.declared_size)
            .field("original_name", &self.original_name)
            .finish_non_exhaustive()
    }
}

/// Validate, classify and store uploads.
#[derive(Clone)]
pub struct IngestionService {
    store: RecordStore,
}

impl IngestionService {
    pub fn new(store: RecordStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Run one upload through size check, classification and storage.
    ///
    /// Oversized and unsupported uploads are rejected before anything is
    /// written.
    #[tracing::instrument(
        skip(self, request),
        fields(
            upload.declared_size = ?request.declared_size,
            upload.original_name = %request.original_name
        )
    )]
    pub async fn ingest(&self, request: UploadRequest<'_>) -> Result<Record, AppError> {
        let UploadRequest {
            mut reader,
            declared_size,
            original_name,
        } = request;

        let max_bytes = self.store.max_bytes();
        if let Some(declared) = declared_size {
            if declared > max_bytes {
                tracing::debug!(declared, max_bytes, "Upload rejected on declared size");
                return Err(AppError::QuotaExceeded { limit: max_bytes });
            }
        }

        let mut prefix = Vec::with_capacity(SNIFF_LEN);
        (&mut reader)
            .take(SNIFF_LEN as u64)
            .read_to_end(&mut prefix)
            .await?;

        if prefix.is_empty() {
            return Err(AppError::InvalidInput("empty upload".to_string()));
        }

        let (kind, mime) = match classify(&prefix) {
            Classification::Accepted {
                kind,
                mime,
                signature,
            } => {
                tracing::debug!(?signature, mime, "Upload classified");
                (kind, mime)
            }
            Classification::Rejected => {
                tracing::debug!("Upload rejected: unrecognized content");
                return Err(AppError::UnsupportedType(
                    "unrecognized content".to_string(),
                ));
            }
        };

        let original_name = sanitize_original_name(&original_name);
        let body: Pin<Box<dyn AsyncRead + Send + '_>> =
            Box::pin(std::io::Cursor::new(prefix).chain(reader));

        self.store
            .create(kind, mime, declared_size, body, &original_name)
            .await
    }
}
