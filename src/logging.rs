//! Per-request log records.
//!
//! The middleware builds one [`RequestRecord`] per request and hands it to the
//! [`RequestSink`] held in the app state. The default sink writes it through
//! `tracing`.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{Method, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::info;

use crate::AppState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestRecord {
    pub method: String,
    pub path: String,
    /// Remote address, `-` when unknown.
    pub address: String,
    /// Reason phrase of the response status.
    pub status: String,
    pub duration: Duration,
}

impl RequestRecord {
    pub fn new(
        method: &Method,
        path: &str,
        address: Option<SocketAddr>,
        status: StatusCode,
        duration: Duration,
    ) -> Self {
        Self {
            method: method.to_string(),
            path: path.to_string(),
            address: address.map_or_else(|| "-".to_string(), |addr| addr.to_string()),
            status: status.canonical_reason().unwrap_or("Unknown").to_string(),
            duration,
        }
    }
}

pub trait RequestSink: Send + Sync {
    fn record(&self, record: &RequestRecord);
}

/// Emits records as `info` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl RequestSink for TracingSink {
    fn record(&self, record: &RequestRecord) {
        info!(
            address = %record.address,
            status = %record.status,
            duration = ?record.duration,
            "{} {}",
            record.method,
            record.path
        );
    }
}

/// Middleware recording method, path, remote address, status and duration.
pub async fn log_requests(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let address = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let start = Instant::now();
    let response = next.run(request).await;

    state.sink.record(&RequestRecord::new(
        &method,
        &path,
        address,
        response.status(),
        start.elapsed(),
    ));

    response
}
