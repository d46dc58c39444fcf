//! Axum Middleware for HTTP Request Tracing and Metrics
//!
//! Wraps every request in a tracing span and records Prometheus metrics
//! against a normalized route so reader ids do not become label values.

use axum::{extract::Request, middleware::Next, response::Response};
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Instant;
use tracing::{info_span, Instrument};

use super::metrics::METRICS;

/// `/readers/<id>` segment.
static READER_SEGMENT: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"/readers/[^/]+").ok());

/// Purely numeric segment.
static NUMERIC_SEGMENT: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"/\d+(/|$)").ok());

/// Normalize a path for metrics and spans.
fn normalize_path(path: &str) -> String {
    let mut result = path.to_string();
    if let Some(re) = READER_SEGMENT.as_ref() {
        result = re.replace_all(&result, "/readers/{reader_id}").into_owned();
    }
    if let Some(re) = NUMERIC_SEGMENT.as_ref() {
        result = re.replace_all(&result, "/{id}$1").into_owned();
    }
    result
}

pub async fn observability_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let normalized_path = normalize_path(&path);

    let span = info_span!(
        "http_request",
        http.method = %method,
        http.target = %path,
        http.route = %normalized_path,
    );

    let response = next.run(request).instrument(span).await;

    let duration = start.elapsed();
    let status = response.status();

    if let Ok(metrics) = METRICS.as_ref() {
        metrics.record_http_request(
            method.as_str(),
            &normalized_path,
            status.as_u16(),
            duration.as_secs_f64(),
        );
    }

    if status.is_server_error() {
        tracing::warn!(
            method = %method,
            path = %path,
            status = status.as_u16(),
            duration_ms = duration.as_millis(),
            "Request failed"
        );
    } else {
        tracing::info!(
            method = %method,
            path = %path,
            status = status.as_u16(),
            duration_ms = duration.as_millis(),
            "Request completed"
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_reader_id() {
        assert_eq!(
            normalize_path("/api/v1/query/readers/PCSCS19139/full-history"),
            "/api/v1/query/readers/{reader_id}/full-history"
        );
        assert_eq!(
            normalize_path("/api/v1/query/readers/PCSCS19139"),
            "/api/v1/query/readers/{reader_id}"
        );
    }

    #[test]
    fn test_normalize_path_numeric_id() {
        assert_eq!(normalize_path("/api/v1/items/12345"), "/api/v1/items/{id}");
    }

    #[test]
    fn test_normalize_path_no_ids() {
        assert_eq!(normalize_path("/api/v1/query/books"), "/api/v1/query/books");
        assert_eq!(normalize_path("/health/ready"), "/health/ready");
    }
}
