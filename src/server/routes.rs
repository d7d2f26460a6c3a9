//! Router definition for one server session.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::server::{handlers, AppState};

/// Build the VitShare wire protocol router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/auth", post(handlers::auth_handler))
        .route("/list", get(handlers::list_handler))
        .route("/download", get(handlers::download_handler))
        .route("/upload", post(handlers::upload_handler))
        // uploads are streamed to disk, not buffered, so no body cap
        .layer(DefaultBodyLimit::disable())
        .with_state(state)
}
