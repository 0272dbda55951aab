use axum::{
    Json,
    extract::{Multipart, Path, Query, State, multipart::MultipartRejection},
    http::header,
    response::{Html, IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::AppState;
use crate::error::FileServerError;
use crate::listing::ListingFormat;
use crate::resolve::{Target, resolve};
use crate::transfer;

/// Query parameters for listing/download endpoints
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// `html` (default) or `text`
    #[serde(default)]
    pub format: ListingFormat,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub root: String,
}

/// GET /health - Health check endpoint
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        root: state.root_dir.display().to_string(),
    })
}

/// GET /version
pub async fn version(State(state): State<AppState>) -> String {
    format!("{}\n", state.renderer.version())
}

/// GET /files - List the root (or download it when the root is a file)
pub async fn list_root(State(state): State<AppState>, Query(query): Query<ListQuery>) -> Response {
    serve(state, String::new(), query.format).await
}

/// GET /files/{*path} - List a directory or download a file
pub async fn list_path(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(query): Query<ListQuery>,
) -> Response {
    serve(state, path, query.format).await
}

async fn serve(state: AppState, path: String, format: ListingFormat) -> Response {
    match serve_target(&state, path, format).await {
        Ok(response) => response,
        Err(err) => error_response(&state, format, err),
    }
}

async fn serve_target(
    state: &AppState,
    path: String,
    format: ListingFormat,
) -> Result<Response, FileServerError> {
    let target = {
        let state = state.clone();
        tokio::task::spawn_blocking(move || resolve(&state, &path))
            .await
            .map_err(|err| FileServerError::Io(std::io::Error::other(err.to_string())))??
    };

    match target {
        Target::Directory { rel_path, entries } => {
            let body = state.renderer.render(format, &rel_path, entries);
            Ok(match format {
                ListingFormat::Html => Html(body).into_response(),
                ListingFormat::Text => {
                    ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body).into_response()
                }
            })
        }
        Target::File { path } => transfer::send_file(&path, state.config.download).await,
    }
}

/// HTML requests get an error page with a success status; plain text
/// requests get the error status with the message as body.
fn error_response(state: &AppState, format: ListingFormat, err: FileServerError) -> Response {
    match format {
        ListingFormat::Html => {
            error!(error = %err, "rendering error page");
            let page = state.renderer.error_page(err.to_string());
            Html(state.renderer.render_html(&page)).into_response()
        }
        ListingFormat::Text => err.into_response(),
    }
}

/// POST /files - Upload a file (multipart, first field carrying a file name)
pub async fn upload_file(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<String, FileServerError> {
    if !state.uploads.enabled {
        return Err(FileServerError::UploadsDisabled);
    }

    let mut multipart = multipart.map_err(|e| FileServerError::InvalidUpload(e.body_text()))?;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        error!("Multipart error: {}", e);
        FileServerError::InvalidUpload(e.body_text())
    })? {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };

        let stored = transfer::receive_file(&state.uploads, &file_name, field).await?;
        info!("Stored upload {} as {}", file_name, stored);
        return Ok(stored);
    }

    Err(FileServerError::InvalidUpload("no file in upload".to_string()))
}
