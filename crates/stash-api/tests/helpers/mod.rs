//! Test helpers: build the router over a temporary data root.
//!
//! Run from workspace root: `cargo test -p stash-api`.

#![allow(dead_code)]

use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use chrono::Utc;
use stash_api::setup::{routes, services};
use stash_api::state::AppState;
use stash_core::{Clock, Config, ManualClock};
use std::sync::Arc;
use tempfile::TempDir;

pub const MAX_FILE_MB: u64 = 1;
pub const MAX_BYTES: u64 = MAX_FILE_MB * 1024 * 1024;
pub const TTL_DAYS: i64 = 14;

pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub clock: Arc<ManualClock>,
    pub _temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }
}

pub fn test_config(temp_dir: &TempDir) -> Config {
    Config {
        data_root: temp_dir.path().to_path_buf(),
        ttl_days: TTL_DAYS,
        max_file_mb: MAX_FILE_MB,
        allowed_hosts: Vec::new(),
        db_max_connections: 4,
        ..Config::default()
    }
}

pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(|_| {}).await
}

/// Like [`setup_test_app`], letting the caller adjust the configuration.
pub async fn setup_test_app_with(adjust: impl FnOnce(&mut Config)) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let mut config = test_config(&temp_dir);
    adjust(&mut config);

    let clock = Arc::new(ManualClock::new(Utc::now()));
    let state = services::initialize_services(&config, clock.clone() as Arc<dyn Clock>)
        .await
        .expect("Failed to initialize services");
    let router = routes::setup_routes(&config, state.clone()).expect("Failed to build routes");
    let server = TestServer::new(router).expect("Failed to start test server");

    TestApp {
        server,
        state,
        clock,
        _temp_dir: temp_dir,
    }
}

pub fn file_form(data: Vec<u8>, file_name: &str) -> MultipartForm {
    MultipartForm::new().add_part(
        "file",
        Part::bytes(data)
            .file_name(file_name.to_string())
            .mime_type("application/octet-stream"),
    )
}

/// Minimal valid 1x1 PNG bytes.
pub fn create_minimal_png() -> Vec<u8> {
    vec![
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x02, 0x00, 0x00, 0x00, 0x90,
        0x77, 0x53, 0xDE, 0x00, 0x00, 0x00, 0x0C, 0x49, 0x44, 0x41, 0x54, 0x08, 0xD7, 0x63, 0xF8,
        0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x18, 0xDD, 0x8D, 0x89, 0x00, 0x00, 0x00,
        0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
    ]
}

/// A PNG signature padded to `len` bytes.
pub fn padded_png(len: usize) -> Vec<u8> {
    let mut data = b"\x89PNG\r\n\x1a\n".to_vec();
    data.resize(len.max(8), 0);
    data
}

/// An empty ZIP archive (end of central directory only) behind a local header.
pub fn create_test_zip() -> Vec<u8> {
    let mut data = b"PK\x03\x04".to_vec();
    data.extend_from_slice(&[0x14, 0x00, 0x00, 0x00, 0x00, 0x00]);
    data.resize(64, 0);
    data
}
