//! Host header validation.
//!
//! Requests whose `Host` is not on the allow list are refused with 400 before
//! reaching a handler. Entries may be exact names or `*.domain` wildcards; an
//! empty list or a `*` entry disables the check.

use crate::error::HttpAppError;
use axum::http::header;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use stash_core::AppError;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct TrustedHosts {
    allowed: Vec<String>,
}

impl TrustedHosts {
    pub fn new(allowed: Vec<String>) -> Self {
        Self {
            allowed: allowed.into_iter().map(|h| h.to_lowercase()).collect(),
        }
    }

    fn allows_any(&self) -> bool {
        self.allowed.is_empty() || self.allowed.iter().any(|h| h == "*")
    }

    pub fn is_allowed(&self, host: &str) -> bool {
        if self.allows_any() {
            return true;
        }

        let host = strip_port(host).to_lowercase();
        self.allowed.iter().any(|pattern| match pattern.strip_prefix("*.") {
            Some(domain) => host
                .strip_suffix(domain)
                .is_some_and(|rest| rest.ends_with('.')),
            None => *pattern == host,
        })
    }
}

/// Drop a trailing `:port`, keeping bracketed IPv6 literals intact.
fn strip_port(host: &str) -> &str {
    if let Some(rest) = host.strip_prefix('[') {
        return rest.split(']').next().unwrap_or(rest);
    }
    host.split(':').next().unwrap_or(host)
}

pub async fn trusted_host_middleware(
    State(hosts): State<Arc<TrustedHosts>>,
    request: Request,
    next: Next,
) -> Response {
    if hosts.allows_any() {
        return next.run(request).await;
    }

    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| request.uri().host())
        .map(str::to_string);

    match host {
        Some(host) if hosts.is_allowed(&host) => next.run(request).await,
        other => {
            tracing::warn!(host = ?other, "Rejected request with untrusted host");
            HttpAppError(AppError::InvalidInput("Invalid host header".to_string())).into_response()
        }
    }
}
