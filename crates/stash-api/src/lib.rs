//! Stash HTTP API
//!
//! Thin axum layer over the ingestion and retention services. Handlers only
//! translate between HTTP and [`stash_services`]; all storage decisions live
//! below this crate.

pub mod constants;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod setup;
pub mod state;
pub mod telemetry;
