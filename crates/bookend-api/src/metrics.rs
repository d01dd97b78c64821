//! Prometheus metrics for the API server.

use std::sync::LazyLock;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use regex::Regex;

/// Install the Prometheus recorder. Harness metrics recorded in-process are
/// exported through it as well.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    pub const HTTP_REQUESTS_TOTAL: &str = "bookend_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "bookend_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "bookend_http_requests_in_flight";
}

static RUN_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(runs|narratives)/[A-Za-z0-9_-]+").unwrap());
static SAMPLE_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/samples/[A-Za-z0-9_-]+").unwrap());

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

/// Replace run and sample ids with placeholders to bound label cardinality.
fn sanitize_path(path: &str) -> String {
    let path = RUN_SEGMENT.replace_all(path, "/$1/:run_id");
    SAMPLE_SEGMENT
        .replace_all(&path, "/samples/:sample_id")
        .into_owned()
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);
    let response = next.run(request).await;
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    record_http_request(
        &method,
        &path,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path() {
        assert_eq!(
            sanitize_path("/api/runs/20250101-120000-abcd1234/samples/s1"),
            "/api/runs/:run_id/samples/:sample_id"
        );
        assert_eq!(sanitize_path("/api/narratives/r1"), "/api/narratives/:run_id");
        assert_eq!(sanitize_path("/api/runs"), "/api/runs");
    }
}
