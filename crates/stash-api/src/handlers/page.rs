use crate::error::HttpAppError;
use crate::handlers::response::{base_url, page_path, PageResponse, RecordResponse};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use stash_core::{AppError, Clock, RecordId, RecordKind};
use std::sync::Arc;

#[tracing::instrument(skip(state, headers), fields(record.id = %id))]
pub async fn image_page(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, HttpAppError> {
    record_page(&state, &headers, &id, RecordKind::Image).await
}

#[tracing::instrument(skip(state, headers), fields(record.id = %id))]
pub async fn file_page(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, HttpAppError> {
    record_page(&state, &headers, &id, RecordKind::File).await
}

/// Record details; a record of the other kind is redirected to its own page.
async fn record_page(
    state: &AppState,
    headers: &HeaderMap,
    raw_id: &str,
    expected: RecordKind,
) -> Result<Response, HttpAppError> {
    let id = RecordId::parse(raw_id)
        .ok_or_else(|| AppError::NotFound("Record not found".to_string()))?;
    let record = state.store.get(&id).await?;

    if record.kind != expected {
        let location = page_path(record.kind, &record.id);
        return Ok((StatusCode::FOUND, [(header::LOCATION, location)]).into_response());
    }

    let now = state.store.clock().now();
    let body = PageResponse {
        remaining_days: record.remaining_days(now, state.ttl_days()),
        record: RecordResponse::new(&record, &base_url(headers)),
    };

    Ok(Json(body).into_response())
}
