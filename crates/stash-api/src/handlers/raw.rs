use crate::constants::{FILE_CACHE_CONTROL, IMAGE_CACHE_CONTROL};
use crate::error::HttpAppError;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::Response,
};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use stash_core::{AppError, RecordId, RecordKind};
use std::sync::Arc;

/// RFC 5987 `attr-char` minus alphanumerics; everything else is escaped.
const ATTR_CHAR: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

pub fn content_disposition(original_name: &str) -> String {
    format!(
        "attachment; filename*=UTF-8''{}",
        utf8_percent_encode(original_name, ATTR_CHAR)
    )
}

fn not_found() -> HttpAppError {
    HttpAppError(AppError::NotFound("Record not found".to_string()))
}

#[tracing::instrument(skip(state), fields(record.id = %id))]
pub async fn raw_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, HttpAppError> {
    serve_raw(&state, &id, RecordKind::Image).await
}

#[tracing::instrument(skip(state), fields(record.id = %id))]
pub async fn raw_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, HttpAppError> {
    serve_raw(&state, &id, RecordKind::File).await
}

/// Stream the stored bytes of a record of the expected kind.
async fn serve_raw(
    state: &AppState,
    raw_id: &str,
    expected: RecordKind,
) -> Result<Response, HttpAppError> {
    let id = RecordId::parse(raw_id).ok_or_else(not_found)?;
    let opened = state.store.open(&id).await?;

    if opened.record.kind != expected {
        return Err(not_found());
    }

    let record = opened.record;
    let blob = opened.blob;

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, record.mime_type.as_str())
        .header(header::CONTENT_LENGTH, blob.len);

    builder = match record.kind {
        RecordKind::Image => builder.header(header::CACHE_CONTROL, IMAGE_CACHE_CONTROL),
        RecordKind::File => builder
            .header(header::CACHE_CONTROL, FILE_CACHE_CONTROL)
            .header(
                header::CONTENT_DISPOSITION,
                content_disposition(&record.original_name),
            ),
    };

    builder
        .body(Body::from_stream(blob.into_stream()))
        .map_err(|e| HttpAppError(AppError::Internal(format!("Failed to build response: {}", e))))
}
