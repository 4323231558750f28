//! Host key check for `role=host` WebSocket connections

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::config::QuizConfig;

#[derive(Debug, Clone)]
pub struct HostAuth {
    /// Shared host key (None = auth disabled)
    key: Option<String>,
}

impl HostAuth {
    pub fn new(key: Option<String>) -> Self {
        Self { key }
    }

    pub fn from_config(config: &QuizConfig) -> Self {
        if config.host_key.is_some() {
            tracing::info!("Host authentication enabled");
        }
        Self::new(config.host_key.clone())
    }

    pub fn is_enabled(&self) -> bool {
        self.key.is_some()
    }

    /// Check a presented key
    pub fn validate(&self, presented: Option<&str>) -> bool {
        match (&self.key, presented) {
            (Some(expected), Some(given)) => constant_time_eq(expected.as_bytes(), given.as_bytes()),
            (Some(_), None) => false,
            // Auth disabled, allow all
            (None, _) => true,
        }
    }
}

/// Constant-time byte comparison to prevent timing attacks
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

fn query_param<'a>(request: &'a Request<Body>, key: &str) -> Option<&'a str> {
    let query = request.uri().query()?;
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v)
}

/// Key from `?key=` or an `Authorization: Bearer` header
fn presented_key(request: &Request<Body>) -> Option<&str> {
    if let Some(key) = query_param(request, "key") {
        return Some(key);
    }
    request
        .headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Middleware to require the host key for host WebSocket connections.
///
/// This prevents clients from taking over by connecting to `/ws?role=host`.
pub async fn host_ws_auth_middleware(
    State(auth): State<Arc<HostAuth>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let is_host_ws =
        request.uri().path() == "/ws" && query_param(&request, "role") == Some("host");

    if !is_host_ws {
        return next.run(request).await;
    }

    if !auth.is_enabled() {
        tracing::warn!(
            "Host WebSocket requested but host authentication is DISABLED; set QUIZ_HOST_KEY to prevent host takeover"
        );
        return next.run(request).await;
    }

    if auth.validate(presented_key(&request)) {
        return next.run(request).await;
    }

    tracing::warn!("Rejected host WebSocket with missing or wrong key");
    (StatusCode::UNAUTHORIZED, "Unauthorized").into_response()
}
