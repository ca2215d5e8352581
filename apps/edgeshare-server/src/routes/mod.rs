//! Route modules for the Edgeshare server

pub mod download;
pub mod health;
pub mod upload;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderMap},
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the full application router
pub fn router(state: AppState) -> Router {
    let max_chunk_size = state.config().upload.max_chunk_size;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/status", get(health::health_check))
        .route(
            "/api/upload",
            post(upload::handle_upload).layer(DefaultBodyLimit::max(max_chunk_size)),
        )
        .route("/api/files/:file_id/download", get(download::api_download))
        .route("/s/:file_id/:token", get(download::share_link_download))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Base for share links: the configured public URL, else the request's Host
pub(crate) fn base_url(state: &AppState, headers: &HeaderMap) -> String {
    if let Some(base) = &state.config().server.public_base_url {
        return base.trim_end_matches('/').to_string();
    }

    match headers.get(header::HOST).and_then(|h| h.to_str().ok()) {
        Some(host) => format!("http://{}", host),
        None => format!("http://localhost:{}", state.config().server.port),
    }
}
