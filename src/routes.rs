use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{StatusCode, header},
    middleware,
    response::IntoResponse,
    routing::get,
};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::AppState;
use crate::handlers;
use crate::logging;

/// Mount point of the served tree.
pub const FILES_URL: &str = "/files";

async fn redirect_to_files() -> impl IntoResponse {
    (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, FILES_URL)])
}

/// Create file server routes
pub fn file_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(redirect_to_files))
        // Health check
        .route("/health", get(handlers::health))
        .route("/version", get(handlers::version))
        // Listings, downloads and uploads. Upload size is enforced while
        // streaming, so the default body limit is lifted.
        .route(
            "/files",
            get(handlers::list_root)
                .post(handlers::upload_file)
                .layer(DefaultBodyLimit::disable()),
        )
        .route("/files/", get(handlers::list_root))
        .route("/files/{*path}", get(handlers::list_path))
}

/// Build the full application with request logging and tracing.
pub fn create_router(state: AppState) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
        .on_response(DefaultOnResponse::new().level(Level::DEBUG));

    Router::new()
        .merge(file_routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            logging::log_requests,
        ))
        .layer(trace_layer)
        .with_state(state)
}
