use crate::error::HttpAppError;
use crate::state::AppState;
use axum::{extract::State, Json};
use serde::Serialize;
use stash_core::RecordKind;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub images: u64,
    pub files: u64,
    pub total_bytes: u64,
}

/// Liveness plus index statistics. A failing index query yields a 500.
#[tracing::instrument(skip(state))]
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> Result<Json<HealthResponse>, HttpAppError> {
    let images = state.store.count(RecordKind::Image).await?;
    let files = state.store.count(RecordKind::File).await?;
    let total_bytes = state.store.total_bytes().await?;

    Ok(Json(HealthResponse {
        status: "ok",
        images,
        files,
        total_bytes,
    }))
}
