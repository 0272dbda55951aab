//! API integration tests.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::http::{StatusCode, header};
use serde_json::Value;
use tempfile::TempDir;

use dirserve::config::{Config, Disposition, ServeMode};
use dirserve::tree::{DirItem, DirReader, EntryInfo, FileTree, FsReader};
use dirserve::{AppState, Source, routes};

mod common;
use common::{body_bytes, body_text, get, sample_root, test_app, test_app_with_sink, upload};

fn uploads_into(root: &TempDir, timestamp: bool) -> Config {
    Config {
        uploads: true,
        uploads_dir: Some(root.path().join("uploads")),
        uploads_timestamp: timestamp,
        ..Config::default()
    }
}

#[tokio::test]
async fn test_health_endpoint() {
    let root = sample_root();
    let app = test_app(&root, Config::default());

    let response = get(&app, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_version_endpoint() {
    let root = sample_root();
    let app = test_app(&root, Config::default());

    let response = get(&app, "/version").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "test-version\n");
}

#[tokio::test]
async fn test_root_redirects_to_files() {
    let root = sample_root();
    let app = test_app(&root, Config::default());

    let response = get(&app, "/").await;
    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(response.headers()[header::LOCATION], "/files");
}

#[tokio::test]
async fn test_text_listing_of_root() {
    let root = sample_root();
    for mode in [ServeMode::Live, ServeMode::Snapshot] {
        let app = test_app(&root, Config { mode, ..Config::default() });

        let response = get(&app, "/files?format=text").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "docs/\nreadme.md 5.00B\n");
    }
}

#[tokio::test]
async fn test_text_listing_of_subdirectory() {
    let root = sample_root();
    let app = test_app(&root, Config::default());

    let response = get(&app, "/files/docs?format=text").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "../\na.txt 10.00B\n");
}

#[tokio::test]
async fn test_html_listing() {
    let root = sample_root();
    let app = test_app(&root, Config::default());

    let response = get(&app, "/files/docs").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/html")
    );

    let html = body_text(response).await;
    assert!(html.contains("href=\"/files/docs/a.txt\""));
    assert!(html.contains("<a href=\"/files/docs\">docs</a>"));
    assert!(html.contains("10.00B"));
    assert!(html.contains("test-version"));
    assert!(!html.contains(".env"));
}

#[tokio::test]
async fn test_dotfiles_and_exclude_pattern() {
    let root = sample_root();
    let config = Config {
        include_dotfiles: true,
        exclude: Some(r"\.md$".to_string()),
        ..Config::default()
    };
    let app = test_app(&root, config);

    let text = body_text(get(&app, "/files?format=text").await).await;
    assert_eq!(text, "docs/\n.env 8.00B\n");

    let html = body_text(get(&app, "/files").await).await;
    assert!(html.contains(".env"));
    assert!(!html.contains("readme.md"));
}

#[tokio::test]
async fn test_download_file() {
    let root = sample_root();
    let app = test_app(&root, Config::default());

    let response = get(&app, "/files/docs/a.txt").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_LENGTH], "10");
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
    assert!(
        response.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .starts_with("inline")
    );
    assert_eq!(body_bytes(response).await, b"0123456789");
}

#[tokio::test]
async fn test_download_as_attachment() {
    let root = sample_root();
    let config = Config {
        download: Disposition::Attachment,
        ..Config::default()
    };
    let app = test_app(&root, config);

    let response = get(&app, "/files/readme.md").await;
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"readme.md\""
    );
}

#[cfg(unix)]
#[tokio::test]
async fn test_download_name_with_control_character() {
    let root = sample_root();
    std::fs::write(root.path().join("a\nb.txt"), "payload").unwrap();

    for mode in [ServeMode::Live, ServeMode::Snapshot] {
        let app = test_app(&root, Config { mode, ..Config::default() });

        let response = get(&app, "/files/a%0Ab.txt").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "inline; filename=\"a_b.txt\"; filename*=UTF-8''a%0Ab.txt"
        );
        assert_eq!(body_bytes(response).await, b"payload");
    }
}

#[tokio::test]
async fn test_missing_path() {
    let root = sample_root();
    for mode in [ServeMode::Live, ServeMode::Snapshot] {
        let app = test_app(&root, Config { mode, ..Config::default() });

        let response = get(&app, "/files/docs/missing.txt?format=text").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_text(response).await, "file not found: /docs/missing.txt");

        // HTML errors are reported in the page
        let response = get(&app, "/files/docs/missing.txt").await;
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("file not found: /docs/missing.txt"));
        assert!(!html.contains("<table>"));
    }
}

/// Real filesystem, except that `docs` cannot be opened.
struct LockedDocs {
    locked: PathBuf,
}

impl DirReader for LockedDocs {
    fn stat(&self, path: &Path) -> io::Result<EntryInfo> {
        FsReader.stat(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<io::Result<DirItem>>> {
        if path == self.locked {
            return Err(io::Error::from(io::ErrorKind::PermissionDenied));
        }
        FsReader.read_dir(path)
    }
}

#[tokio::test]
async fn test_snapshot_unreadable_directory() {
    let root = sample_root();
    let config = Config {
        mode: ServeMode::Snapshot,
        ..Config::default()
    };
    let mut state = AppState::new(root.path().to_path_buf(), config, "test-version").unwrap();
    let reader = LockedDocs {
        locked: state.root_dir.join("docs"),
    };
    let tree = FileTree::build_with_reporter(&reader, &state.root_dir, |_, _| {}).unwrap();
    state.source = Source::Snapshot(Arc::new(tree));
    let app = routes::create_router(state);

    let response = get(&app, "/files/docs?format=text").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(body_text(response).await.starts_with("directory cannot be read: /docs"));

    let response = get(&app, "/files/docs").await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("directory cannot be read: /docs"));
    assert!(!html.contains("<table>"));

    // The rest of the tree is still served
    let response = get(&app, "/files?format=text").await;
    assert_eq!(body_text(response).await, "docs/\nreadme.md 5.00B\n");
}

#[tokio::test]
async fn test_path_traversal_rejected() {
    let root = sample_root();
    let app = test_app(&root, Config::default());

    let response = get(&app, "/files/docs/%2E%2E/%2E%2E/etc/passwd?format=text").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_file_root() {
    let root = sample_root();
    let state = AppState::new(root.path().join("readme.md"), Config::default(), "test-version").unwrap();
    let app = routes::create_router(state);

    let response = get(&app, "/files").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"hello");
}

#[tokio::test]
async fn test_upload_round_trip() {
    let root = sample_root();
    let app = test_app(&root, uploads_into(&root, false));

    let content = b"uploaded \x00\x01 bytes".to_vec();
    let response = upload(&app, "a.txt", &content).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "a.txt");

    let response = get(&app, "/files/uploads/a.txt").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, content);
}

#[tokio::test]
async fn test_upload_round_trip_with_timestamp() {
    let root = sample_root();
    let app = test_app(&root, uploads_into(&root, true));

    let response = upload(&app, "a.txt", b"stamped").await;
    assert_eq!(response.status(), StatusCode::OK);
    let stored = body_text(response).await;
    assert_ne!(stored, "a.txt");
    assert!(stored.ends_with("-a.txt"));

    let response = get(&app, &format!("/files/uploads/{stored}")).await;
    assert_eq!(body_bytes(response).await, b"stamped");
}

#[tokio::test]
async fn test_upload_overwrites_same_name() {
    let root = sample_root();
    let app = test_app(&root, uploads_into(&root, false));

    upload(&app, "a.txt", b"first").await;
    upload(&app, "a.txt", b"second").await;

    let response = get(&app, "/files/uploads/a.txt").await;
    assert_eq!(body_bytes(response).await, b"second");
}

#[tokio::test]
async fn test_upload_disabled() {
    let root = sample_root();
    let app = test_app(&root, Config::default());

    let response = upload(&app, "a.txt", b"nope").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_text(response).await, "uploads are disabled");
}

#[tokio::test]
async fn test_upload_too_large() {
    let root = sample_root();
    let config = Config {
        max_upload_size: 4,
        ..uploads_into(&root, false)
    };
    let app = test_app(&root, config);

    let response = upload(&app, "big.bin", b"0123456789").await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(!root.path().join("uploads/big.bin").exists());
}

#[tokio::test]
async fn test_request_records() {
    let root = sample_root();
    let (app, sink) = test_app_with_sink(&root, Config::default());

    get(&app, "/files/readme.md").await;
    get(&app, "/files/nope?format=text").await;

    let records = sink.records.lock().unwrap().clone();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].method, "GET");
    assert_eq!(records[0].path, "/files/readme.md");
    assert_eq!(records[0].status, "OK");
    assert_eq!(records[0].address, "-");
    assert_eq!(records[1].status, "Not Found");
}
