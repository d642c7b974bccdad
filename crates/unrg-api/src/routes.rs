//! API routes.

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;

use crate::auth::require_bearer;
use crate::handlers::{
    delete_file, delete_image, download_file, download_image, health, list_files, list_images,
    ready, upload_file, upload_image,
};
use crate::metrics::metrics_middleware;
use crate::middleware::{request_id, request_logging};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let file_routes = Router::new()
        .route("/file/upload", post(upload_file))
        .route("/file/download/:filename", get(download_file))
        .route("/file/list", get(list_files))
        .route("/file/:filename", delete(delete_file));

    let image_routes = Router::new()
        .route("/img/upload", post(upload_image))
        .route("/img/download/:name", get(download_image))
        .route("/img/list", get(list_images))
        .route("/img/:name", delete(delete_image));

    // Uploads are streamed to disk; only the outer limit applies
    let api_routes = Router::new()
        .merge(file_routes)
        .merge(image_routes)
        .layer(DefaultBodyLimit::disable())
        .layer(middleware::from_fn_with_state(state.clone(), require_bearer));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready));

    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .with_state(state)
}
