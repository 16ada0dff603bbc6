/// Metrics and telemetry for Plaza
///
/// Prometheus-compatible metrics:
/// - HTTP request counts and latencies
/// - Account, content and group activity
/// - Background job execution
/// - Media cleanup failures

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};
use std::time::Instant;

lazy_static! {
    // ========== HTTP Metrics ==========

    /// Total HTTP requests by method, route, and status
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    /// HTTP request duration in seconds
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request latencies in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    /// Active HTTP requests
    pub static ref HTTP_REQUESTS_ACTIVE: IntGauge = register_int_gauge!(
        "http_requests_active",
        "Number of HTTP requests currently being processed"
    )
    .unwrap();

    // ========== Domain Metrics ==========

    pub static ref USERS_REGISTERED_TOTAL: IntCounter = register_int_counter!(
        "users_registered_total",
        "Total number of accounts registered"
    )
    .unwrap();

    pub static ref POSTS_CREATED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "posts_created_total",
        "Total number of posts created",
        &["scope"]
    )
    .unwrap();

    /// Like/unlike and comment add/delete operations
    pub static ref ENGAGEMENT_TOTAL: IntCounterVec = register_int_counter_vec!(
        "engagement_total",
        "Total number of engagement mutations",
        &["action"]
    )
    .unwrap();

    pub static ref MEDIA_CLEANUP_FAILURES_TOTAL: IntCounter = register_int_counter!(
        "media_cleanup_failures_total",
        "Media deletions that failed after the owning record was removed"
    )
    .unwrap();

    // ========== Background Job Metrics ==========

    /// Background job executions by job type and status
    pub static ref BACKGROUND_JOBS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "background_jobs_total",
        "Total number of background job executions",
        &["job_type", "status"]
    )
    .unwrap();

    pub static ref TOKENS_SWEPT_TOTAL: IntCounter = register_int_counter!(
        "refresh_tokens_swept_total",
        "Expired refresh tokens removed by the sweeper"
    )
    .unwrap();
}

/// Render metrics in Prometheus text format
pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration);
}

/// Record a background job run
pub fn record_background_job(job_type: &str, success: bool) {
    BACKGROUND_JOBS_TOTAL
        .with_label_values(&[job_type, if success { "success" } else { "failure" }])
        .inc();
}

/// Record an engagement mutation ("like", "unlike", "comment", "uncomment")
pub fn record_engagement(action: &str) {
    ENGAGEMENT_TOTAL.with_label_values(&[action]).inc();
}

/// Middleware recording request counts and latency per matched route
pub async fn track_http_metrics(req: Request, next: Next) -> Response {
    // Label by route template to keep cardinality bounded
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let method = req.method().to_string();

    HTTP_REQUESTS_ACTIVE.inc();
    let start = Instant::now();
    let response = next.run(req).await;
    HTTP_REQUESTS_ACTIVE.dec();

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
    fn test_record_http_request() {
        record_http_request("GET", "/api/posts/:id", 200, 0.05);
        let metrics = render_metrics();
        assert!(metrics.contains("http_requests_total"));
        assert!(metrics.contains("http_request_duration_seconds"));
    }

    #[test]
    fn test_record_background_job() {
        record_background_job("token_sweep", true);
        let metrics = render_metrics();
        assert!(metrics.contains("background_jobs_total"));
    }

    #[test]
    fn test_record_engagement() {
        record_engagement("like");
        let metrics = render_metrics();
        assert!(metrics.contains("engagement_total"));
    }
}
