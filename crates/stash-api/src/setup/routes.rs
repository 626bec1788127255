//! Route configuration and setup.

use crate::constants::MULTIPART_SLACK_BYTES;
use crate::handlers::{health, list, page, raw, robots, upload};
use crate::middleware::{
    security_headers_middleware, trusted_host_middleware, SecurityHeadersConfig, TrustedHosts,
};
use crate::state::AppState;
use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use stash_core::Config;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router<()>, anyhow::Error> {
    let body_limit = state.max_file_bytes().saturating_add(MULTIPART_SLACK_BYTES);
    let body_limit = usize::try_from(body_limit)
        .context("Upload limit does not fit in memory address space")?;

    let security_headers = Arc::new(SecurityHeadersConfig::new(config.is_production()));
    let trusted_hosts = Arc::new(TrustedHosts::new(config.allowed_hosts.clone()));

    let router = Router::new()
        .route("/upload", post(upload::upload_file))
        .route("/raw/image/{id}", get(raw::raw_image))
        .route("/raw/file/{id}", get(raw::raw_file))
        .route("/i/{id}", get(page::image_page))
        .route("/f/{id}", get(page::file_page))
        .route("/list/images", get(list::list_images))
        .route("/list/files", get(list::list_files))
        .route("/health", get(health::health_check))
        .route("/robots.txt", get(robots::robots_txt))
        // The upload limit is enforced by the layer below and by ingestion
        // itself; axum's 2 MB default would undercut it.
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(from_fn_with_state(trusted_hosts, trusted_host_middleware))
        .layer(from_fn_with_state(
            security_headers,
            security_headers_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Ok(router)
}
