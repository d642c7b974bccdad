//! Prometheus metrics for the API server.

use axum::body::{Body, Bytes};
use axum::http::{Request, Response};
use axum::middleware::Next;
use futures_util::{Stream, TryStreamExt};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::time::Instant;
use unrg_models::Namespace;

/// Initialize the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "unrg_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "unrg_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "unrg_http_requests_in_flight";

    // Auth
    pub const AUTH_REJECTIONS_TOTAL: &str = "unrg_auth_rejections_total";

    // Storage traffic
    pub const OBJECTS_STORED_TOTAL: &str = "unrg_objects_stored_total";
    pub const BYTES_STORED_TOTAL: &str = "unrg_bytes_stored_total";
    pub const BYTES_SERVED_TOTAL: &str = "unrg_bytes_served_total";
    pub const OBJECTS_DELETED_TOTAL: &str = "unrg_objects_deleted_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a request turned away by the auth gate.
pub fn record_auth_rejection(reason: &'static str) {
    counter!(names::AUTH_REJECTIONS_TOTAL, "reason" => reason).increment(1);
}

/// Record a completed upload.
pub fn record_object_stored(namespace: Namespace, bytes: u64) {
    let labels = [("namespace", namespace.to_string())];
    counter!(names::OBJECTS_STORED_TOTAL, &labels).increment(1);
    counter!(names::BYTES_STORED_TOTAL, &labels).increment(bytes);
}

/// Record bytes handed to a download response.
pub fn record_bytes_served(namespace: Namespace, bytes: u64) {
    let labels = [("namespace", namespace.to_string())];
    counter!(names::BYTES_SERVED_TOTAL, &labels).increment(bytes);
}

/// Count download bytes chunk by chunk as the body is polled.
pub fn count_bytes_served<S, E>(namespace: Namespace, stream: S) -> impl Stream<Item = Result<Bytes, E>>
where
    S: Stream<Item = Result<Bytes, E>>,
{
    stream.inspect_ok(move |chunk| record_bytes_served(namespace, chunk.len() as u64))
}

/// Record a deleted object.
pub fn record_object_deleted(namespace: Namespace) {
    let labels = [("namespace", namespace.to_string())];
    counter!(names::OBJECTS_DELETED_TOTAL, &labels).increment(1);
}

/// Sanitize path for metrics labels (object names become `:name`).
fn sanitize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').collect();
    match segments.as_slice() {
        ["", "health" | "ready" | "metrics"] => path.to_string(),
        ["", "api", ns @ ("file" | "img"), "upload" | "list"] => {
            format!("/api/{}/{}", ns, segments[3])
        }
        ["", "api", ns @ ("file" | "img"), "download", _] => format!("/api/{}/download/:name", ns),
        ["", "api", ns @ ("file" | "img"), _] => format!("/api/{}/:name", ns),
        _ => "/:unmatched".to_string(),
    }
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}
