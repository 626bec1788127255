//! JSON bodies shared by the record endpoints.

use axum::http::{header, HeaderMap};
use chrono::{DateTime, Utc};
use serde::Serialize;
use stash_core::{Record, RecordId, RecordKind};

#[derive(Debug, Serialize)]
pub struct RecordResponse {
    #[serde(rename = "type")]
    pub kind: RecordKind,
    pub id: RecordId,
    pub size_bytes: u64,
    pub mime_type: String,
    pub created_at: DateTime<Utc>,
    pub original_name: String,
    pub page_url: String,
    pub raw_url: String,
}

impl RecordResponse {
    /// Build the response; `base_url` is prefixed to both links and may be
    /// empty for relative links.
    pub fn new(record: &Record, base_url: &str) -> Self {
        Self {
            kind: record.kind,
            id: record.id.clone(),
            size_bytes: record.size_bytes,
            mime_type: record.mime_type.clone(),
            created_at: record.created_at,
            original_name: record.original_name.clone(),
            page_url: format!("{}{}", base_url, page_path(record.kind, &record.id)),
            raw_url: format!("{}{}", base_url, raw_path(record.kind, &record.id)),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PageResponse {
    #[serde(flatten)]
    pub record: RecordResponse,
    /// Whole days until the record becomes eligible for expiry.
    pub remaining_days: i64,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub items: Vec<RecordResponse>,
}

pub fn page_path(kind: RecordKind, id: &RecordId) -> String {
    match kind {
        RecordKind::Image => format!("/i/{}", id),
        RecordKind::File => format!("/f/{}", id),
    }
}

pub fn raw_path(kind: RecordKind, id: &RecordId) -> String {
    match kind {
        RecordKind::Image => format!("/raw/image/{}", id),
        RecordKind::File => format!("/raw/file/{}", id),
    }
}

/// Absolute origin of the current request, honouring a terminating proxy.
pub fn base_url(headers: &HeaderMap) -> String {
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| *v == "http" || *v == "https")
        .unwrap_or("http");

    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");

    format!("{}://{}", scheme, host)
}
