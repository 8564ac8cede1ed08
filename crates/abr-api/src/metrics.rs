//! Prometheus metrics for the API server.

use std::sync::LazyLock;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use regex::Regex;

/// Install the Prometheus recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "abr_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "abr_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "abr_http_requests_in_flight";

    // Status streams
    pub const SSE_STREAMS_ACTIVE: &str = "abr_sse_streams_active";
    pub const UPLOADS_TOTAL: &str = "abr_uploads_total";
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

/// Record an upload by how it ended ("accepted", "rejected", "invalid").
pub fn record_upload(outcome: &str) {
    let labels = [("outcome", outcome.to_string())];
    counter!(names::UPLOADS_TOTAL, &labels).increment(1);
}

pub fn sse_stream_opened() {
    gauge!(names::SSE_STREAMS_ACTIVE).increment(1.0);
}

pub fn sse_stream_closed() {
    gauge!(names::SSE_STREAMS_ACTIVE).decrement(1.0);
}

static JOB_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/transcode/(status|jobs)/[^/]+$").expect("valid job path regex")
});

/// Collapse job ids so label cardinality stays bounded.
fn sanitize_path(path: &str) -> String {
    JOB_PATH.replace(path, "/transcode/$1/:job_id").to_string()
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
    record_http_request(&method, &path, status, start.elapsed().as_secs_f64());

    response
}
