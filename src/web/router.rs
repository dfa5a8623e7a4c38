//! Router configuration for the broker service.

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::cors::create_cors_layer;
use super::handlers::{
    delete_file, get_object, health_check, list_files, put_object, request_download,
    request_upload, AppState,
};
use crate::config::ServerConfig;

/// Create the service router.
pub fn create_router(app_state: Arc<AppState>, config: &ServerConfig) -> Router {
    let api_routes = Router::new()
        .route(
            "/files",
            get(list_files).post(request_download).delete(delete_file),
        )
        .route("/upload", post(request_upload));

    // Signed locations carry their own authorization in the query string.
    let object_routes = Router::new()
        .route("/objects/*key", put(put_object).get(get_object))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes()));

    Router::new()
        .nest("/api", api_routes)
        .merge(object_routes)
        .route("/health", get(health_check))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(create_cors_layer(&config.cors_origins)),
        )
        .with_state(app_state)
}
