use crate::constants::{MULTIPART_SLACK_BYTES, UPLOAD_FIELD};
use crate::error::{multipart_error, HttpAppError};
use crate::handlers::response::{base_url, RecordResponse};
use crate::state::AppState;
use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::{header, HeaderMap, StatusCode},
    Json,
};
use futures::TryStreamExt;
use stash_core::AppError;
use stash_services::UploadRequest;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::io::StreamReader;

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

/// Accept one upload in the multipart field `file`.
///
/// The field is streamed straight into ingestion; nothing is buffered beyond
/// the classification prefix.
#[tracing::instrument(skip(state, headers, multipart))]
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<RecordResponse>), HttpAppError> {
    let max_bytes = state.max_file_bytes();

    // An unparsable header is ignored; the streaming limit still applies.
    if let Some(len) = content_length(&headers) {
        if len > max_bytes.saturating_add(MULTIPART_SLACK_BYTES) {
            tracing::debug!(content_length = len, max_bytes, "Upload rejected on Content-Length");
            return Err(AppError::QuotaExceeded { limit: max_bytes }.into());
        }
    }

    let mut multipart = multipart?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_bytes))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let original_name = match field.file_name() {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => return Err(AppError::InvalidInput("no filename".to_string()).into()),
        };

        // The body limit surfaces as an I/O error inside ingestion; remember
        // it so the client still gets a 413.
        let body_limit_hit = Arc::new(AtomicBool::new(false));
        let stream = field.map_err({
            let body_limit_hit = body_limit_hit.clone();
            move |e| {
                if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                    body_limit_hit.store(true, Ordering::Release);
                }
                io::Error::other(e)
            }
        });

        let request = UploadRequest {
            reader: Box::pin(StreamReader::new(stream)),
            declared_size: None,
            original_name,
        };

        let record = match state.ingestion.ingest(request).await {
            Ok(record) => record,
            Err(_) if body_limit_hit.load(Ordering::Acquire) => {
                return Err(AppError::QuotaExceeded { limit: max_bytes }.into());
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            record_id = %record.id,
            kind = %record.kind,
            size_bytes = record.size_bytes,
            "Upload stored"
        );

        return Ok((
            StatusCode::OK,
            Json(RecordResponse::new(&record, &base_url(&headers))),
        ));
    }

    Err(AppError::InvalidInput(format!("missing multipart field '{}'", UPLOAD_FIELD)).into())
}
