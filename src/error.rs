use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum FileServerError {
    #[error("file not found: {0}")]
    NotFound(String),

    #[error("path is outside root directory")]
    PathTraversal,

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("directory cannot be read: {path}: {reason}")]
    UnreadableDirectory { path: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("file too large: {size} bytes exceeds limit of {limit} bytes")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("invalid upload: {0}")]
    InvalidUpload(String),

    #[error("uploads are disabled")]
    UploadsDisabled,

    #[error("failed to create directory: {0}")]
    CreateDirFailed(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid exclude pattern: {0}")]
    Pattern(#[from] regex::Error),
}

impl FileServerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            FileServerError::NotFound(_) => StatusCode::NOT_FOUND,
            FileServerError::PathTraversal => StatusCode::FORBIDDEN,
            FileServerError::InvalidPath(_) => StatusCode::BAD_REQUEST,
            FileServerError::UnreadableDirectory { .. } => StatusCode::FORBIDDEN,
            FileServerError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            FileServerError::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            FileServerError::InvalidUpload(_) => StatusCode::BAD_REQUEST,
            FileServerError::UploadsDisabled => StatusCode::FORBIDDEN,
            FileServerError::CreateDirFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            FileServerError::Config(_) | FileServerError::Pattern(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Map a stat/open failure on `path` to `NotFound` when the entry is
    /// simply missing, keeping every other failure as an IO error.
    pub fn from_lookup(err: std::io::Error, path: &str) -> Self {
        use std::io::ErrorKind;

        match err.kind() {
            ErrorKind::NotFound | ErrorKind::NotADirectory => {
                FileServerError::NotFound(display_path(path))
            }
            _ => FileServerError::Io(err),
        }
    }
}

/// Request paths are root-relative; show them rooted for messages.
pub fn display_path(path: &str) -> String {
    format!("/{}", path.trim_start_matches('/'))
}

/// Plain HTTP error: status plus the message as body.
impl IntoResponse for FileServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        error!(error = %self, status = status.as_u16(), "request failed");
        (status, self.to_string()).into_response()
    }
}
