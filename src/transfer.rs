//! Streaming downloads and upload ingestion.

use std::io;
use std::path::Path;

use axum::{
    body::Body,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt, TryStreamExt};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, error, info, warn};

use crate::config::{Disposition, UploadSettings};
use crate::error::FileServerError;

/// Stream the file at `path` as the response body.
///
/// Once headers are sent a read failure can only cut the body short; it is
/// logged and the connection is closed.
pub async fn send_file(path: &Path, disposition: Disposition) -> Result<Response, FileServerError> {
    let metadata = fs::metadata(path)
        .await
        .map_err(|err| FileServerError::from_lookup(err, &path.to_string_lossy()))?;

    if !metadata.is_file() {
        return Err(FileServerError::NotFound(path.display().to_string()));
    }

    debug!("Streaming file: {}", path.display());

    let file = fs::File::open(path).await.map_err(FileServerError::Io)?;
    let logged_path = path.display().to_string();
    let stream = ReaderStream::new(file).inspect_err(move |err| {
        error!(path = %logged_path, error = %err, "download interrupted");
    });

    let mime = mime_guess::from_path(path)
        .first_or_octet_stream()
        .to_string();

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, mime),
            (header::CONTENT_LENGTH, metadata.len().to_string()),
            (
                header::CONTENT_DISPOSITION,
                content_disposition(disposition, &file_name),
            ),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}

/// Content-Disposition value for `file_name`.
///
/// The quoted `filename` keeps printable ASCII only, with quotes and
/// backslashes replaced. Any name that needed replacing is also sent in
/// full as a percent-encoded `filename*`.
pub fn content_disposition(disposition: Disposition, file_name: &str) -> String {
    let fallback: String = file_name
        .chars()
        .map(|c| match c {
            ' '..='~' if c != '"' && c != '\\' => c,
            _ => '_',
        })
        .collect();

    if fallback == file_name {
        format!("{}; filename=\"{}\"", disposition.as_str(), fallback)
    } else {
        format!(
            "{}; filename=\"{}\"; filename*=UTF-8''{}",
            disposition.as_str(),
            fallback,
            urlencoding::encode(file_name)
        )
    }
}

/// Sanitize a filename by removing dangerous characters and path components.
/// Returns None if the filename is invalid or empty after sanitization.
pub fn sanitize_filename(filename: &str) -> Option<String> {
    let sanitized: String = filename
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect();

    // Leading/trailing dots and spaces
    let sanitized = sanitized.trim_matches(|c| c == '.' || c == ' ');
    if sanitized.is_empty() {
        return None;
    }

    let upper = sanitized.to_uppercase();
    let stem = upper.split('.').next().unwrap_or_default();
    let reserved = [
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7",
        "COM8", "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    if reserved.contains(&stem) {
        return None;
    }

    // 255 bytes, cut on a char boundary
    let mut end = sanitized.len().min(255);
    while !sanitized.is_char_boundary(end) {
        end -= 1;
    }
    Some(sanitized[..end].to_string())
}

/// Name an upload is stored under, with an optional creation-time prefix.
pub fn stored_name(file_name: &str, timestamp: Option<DateTime<Utc>>) -> String {
    match timestamp {
        Some(ts) => format!("{}-{}", ts.format("%Y%m%d%H%M%S%3f"), file_name),
        None => file_name.to_string(),
    }
}

/// Write an uploaded byte stream into the uploads directory.
///
/// Returns the stored file name. Without timestamping an existing upload of
/// the same name is replaced. If the stream fails, the size limit is hit or
/// the write fails, the partially written file is removed.
pub async fn receive_file<S, E>(
    settings: &UploadSettings,
    filename: &str,
    content: S,
) -> Result<String, FileServerError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    if !settings.enabled {
        return Err(FileServerError::UploadsDisabled);
    }

    let file_name = sanitize_filename(filename).ok_or_else(|| {
        warn!("Rejected invalid filename: {:?}", filename);
        FileServerError::InvalidPath(format!("Invalid filename: {}", filename))
    })?;

    fs::create_dir_all(&settings.dir).await.map_err(|e| {
        error!("Failed to create uploads directory: {}", e);
        FileServerError::CreateDirFailed(settings.dir.display().to_string())
    })?;

    let stored = stored_name(&file_name, settings.timestamp.then(Utc::now));
    let dest = settings.dir.join(&stored);

    let mut file = fs::File::create(&dest).await.map_err(FileServerError::Io)?;
    let content = std::pin::pin!(content);

    match copy_stream(&mut file, content, settings.max_size).await {
        Ok(written) => {
            info!("Uploaded file: {} ({} bytes)", dest.display(), written);
            Ok(stored)
        }
        Err(err) => {
            drop(file);
            if let Err(remove_err) = fs::remove_file(&dest).await {
                warn!("Failed to remove partial upload {}: {}", dest.display(), remove_err);
            }
            error!("Upload of {} failed: {}", dest.display(), err);
            Err(err)
        }
    }
}

async fn copy_stream<S, E>(
    file: &mut fs::File,
    mut content: std::pin::Pin<&mut S>,
    limit: Option<u64>,
) -> Result<u64, FileServerError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let mut written: u64 = 0;

    while let Some(chunk) = content.next().await {
        let chunk =
            chunk.map_err(|e| FileServerError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))?;

        written += chunk.len() as u64;
        if let Some(limit) = limit {
            if written > limit {
                return Err(FileServerError::FileTooLarge {
                    size: written,
                    limit,
                });
            }
        }

        file.write_all(&chunk).await?;
    }

    file.flush().await?;
    Ok(written)
}
