//! Prometheus metrics for podbay.
//!
//! Installs a global Prometheus recorder using `metrics-exporter-prometheus`,
//! defines metric name constants, provides a Tower-compatible middleware for
//! HTTP RED metrics, and exposes the `/metrics` endpoint handler.

use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;

// -- Metric name constants ----------------------------------------------------

/// Total HTTP requests (counter). Labels: method, path, status.
pub const HTTP_REQUESTS_TOTAL: &str = "podbay_http_requests_total";

/// HTTP request duration in seconds (histogram). Labels: method, path.
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "podbay_http_request_duration_seconds";

/// Total object storage operations (counter). Labels: operation, outcome.
pub const STORAGE_OPERATIONS_TOTAL: &str = "podbay_storage_operations_total";

// -- Global recorder installation ---------------------------------------------

/// Singleton handle to the Prometheus recorder.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global Prometheus metrics recorder. Idempotent -- safe to call
/// multiple times (e.g. in tests). Returns a reference to the global handle.
pub fn init_metrics() -> &'static PrometheusHandle {
    PROMETHEUS_HANDLE.get_or_init(|| {
        PrometheusBuilder::new()
            .install_recorder()
            .expect("failed to install Prometheus recorder")
    })
}

/// Register metric descriptions with the global recorder. Call once after
/// `init_metrics()`.
pub fn describe_metrics() {
    describe_counter!(HTTP_REQUESTS_TOTAL, "Total HTTP requests");
    describe_histogram!(
        HTTP_REQUEST_DURATION_SECONDS,
        "HTTP request duration in seconds"
    );
    describe_counter!(
        STORAGE_OPERATIONS_TOTAL,
        "Total object storage operations by outcome"
    );
}

/// Record one storage façade operation and its outcome tag.
pub fn record_storage_operation(operation: &'static str, outcome: &'static str) {
    counter!(STORAGE_OPERATIONS_TOTAL, "operation" => operation, "outcome" => outcome)
        .increment(1);
}

// -- Metrics middleware -------------------------------------------------------

/// Axum middleware that records HTTP RED metrics for every request.
///
/// Excludes `/metrics` from self-instrumentation to avoid feedback loops.
/// Must be the outermost layer so it captures the full request lifecycle.
pub async fn metrics_middleware(
    req: Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> Response {
    let method = req.method().to_string();
    let path = normalize_path(req.uri().path());

    // Do not instrument the metrics endpoint itself.
    if req.uri().path() == "/metrics" {
        return next.run(req).await;
    }

    let start = Instant::now();
    let response = next.run(req).await;
    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    counter!(HTTP_REQUESTS_TOTAL, "method" => method.clone(), "path" => path.clone(), "status" => status).increment(1);
    histogram!(HTTP_REQUEST_DURATION_SECONDS, "method" => method, "path" => path).record(duration);

    response
}

// -- Path normalization -------------------------------------------------------

/// Normalize an actual request path to a route template for metric labels.
///
/// Object keys and filenames would otherwise produce unbounded label
/// cardinality.
///
/// Examples:
/// - `/storage` -> `/storage`
/// - `/storage/view/some/key.txt` -> `/storage/view/{key}`
/// - `/filesystem?file=x` -> `/filesystem`
fn normalize_path(path: &str) -> String {
    if path.starts_with("/storage/view/") {
        "/storage/view/{key}".to_string()
    } else {
        path.to_string()
    }
}

// -- Metrics endpoint handler -------------------------------------------------

/// `GET /metrics` -- Render Prometheus exposition format text.
pub async fn metrics_handler() -> impl IntoResponse {
    let handle = PROMETHEUS_HANDLE
        .get()
        .expect("Prometheus recorder not initialized");
    let body = handle.render();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        body,
    )
}

// -- Tests --------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_plain_routes() {
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("/home"), "/home");
        assert_eq!(normalize_path("/storage"), "/storage");
        assert_eq!(normalize_path("/filesystem"), "/filesystem");
    }

    #[test]
    fn test_normalize_path_object_keys() {
        assert_eq!(normalize_path("/storage/view/key"), "/storage/view/{key}");
        assert_eq!(
            normalize_path("/storage/view/path/to/object.txt"),
            "/storage/view/{key}"
        );
    }
}
