//! Test utilities and common setup.

#![allow(dead_code)]

use std::fs;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, Response, header};
use tempfile::TempDir;
use tower::ServiceExt;

use dirserve::config::Config;
use dirserve::logging::{RequestRecord, RequestSink};
use dirserve::{AppState, routes};

pub const BOUNDARY: &str = "dirserve-test-boundary";

/// Sink that keeps every record for inspection.
#[derive(Default)]
pub struct CollectingSink {
    pub records: Mutex<Vec<RequestRecord>>,
}

impl RequestSink for CollectingSink {
    fn record(&self, record: &RequestRecord) {
        self.records.lock().unwrap().push(record.clone());
    }
}

/// Root with `docs/a.txt` (10 bytes), `readme.md` (5 bytes) and a dotfile.
pub fn sample_root() -> TempDir {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("docs")).unwrap();
    fs::write(temp.path().join("docs/a.txt"), "0123456789").unwrap();
    fs::write(temp.path().join("readme.md"), "hello").unwrap();
    fs::write(temp.path().join(".env"), "SECRET=1").unwrap();
    temp
}

pub fn test_app(root: &TempDir, config: Config) -> Router {
    let state = AppState::new(root.path().to_path_buf(), config, "test-version").unwrap();
    routes::create_router(state)
}

pub fn test_app_with_sink(root: &TempDir, config: Config) -> (Router, Arc<CollectingSink>) {
    let sink = Arc::new(CollectingSink::default());
    let state = AppState::new(root.path().to_path_buf(), config, "test-version")
        .unwrap()
        .with_sink(sink.clone());
    (routes::create_router(state), sink)
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    app.clone()
        .oneshot(
            Request::builder()
                .uri(uri)
                .method(Method::GET)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

pub async fn upload(app: &Router, file_name: &str, content: &[u8]) -> Response<Body> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    app.clone()
        .oneshot(
            Request::builder()
                .uri("/files")
                .method(Method::POST)
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), 16 * 1024 * 1024)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_text(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}
