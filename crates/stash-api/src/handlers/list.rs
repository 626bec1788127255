use crate::error::HttpAppError;
use crate::handlers::response::{ListResponse, RecordResponse};
use crate::state::AppState;
use axum::{extract::State, Json};
use futures::TryStreamExt;
use stash_core::RecordKind;
use std::sync::Arc;

pub async fn list_images(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ListResponse>, HttpAppError> {
    list_kind(&state, RecordKind::Image).await
}

pub async fn list_files(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ListResponse>, HttpAppError> {
    list_kind(&state, RecordKind::File).await
}

/// Newest first, with relative links.
#[tracing::instrument(skip(state))]
async fn list_kind(state: &AppState, kind: RecordKind) -> Result<Json<ListResponse>, HttpAppError> {
    let items = state
        .store
        .list(kind)
        .map_ok(|record| RecordResponse::new(&record, ""))
        .try_collect::<Vec<_>>()
        .await?;

    Ok(Json(ListResponse { items }))
}
