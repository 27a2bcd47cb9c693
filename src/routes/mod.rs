//! HTTP routes for the image extraction service

pub mod files;
pub mod health;
pub mod images;
pub mod pages;

use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the full application router
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let max_file_size = state.config().upload.max_file_size;

    Router::new()
        .route("/", get(health::status))
        .route("/health", get(health::health_check))
        .route("/upload", get(pages::upload_page))
        .merge(images::router(max_file_size))
        .merge(files::router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
