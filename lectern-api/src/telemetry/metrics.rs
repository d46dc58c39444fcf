//! Prometheus Metrics Definitions
//!
//! All metrics live in the default registry and are exposed at `/metrics`.
//! Cache gauges are copied from the cache's own counters at scrape time.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use lectern_storage::CacheStats;
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, CounterVec, Encoder, Gauge,
    HistogramVec, TextEncoder,
};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// HTTP request latency buckets (seconds)
/// Covers: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0,
];

const DB_LATENCY_BUCKETS: &[f64] =
    &[0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0];

/// Recommender calls are slow; buckets go up to the default attempt timeout.
const RECOMMENDATION_LATENCY_BUCKETS: &[f64] = &[0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0, 120.0];

/// Global metrics instance - initialized once on first use
pub static METRICS: Lazy<ApiResult<LecternMetrics>> = Lazy::new(LecternMetrics::new);

#[derive(Clone)]
pub struct LecternMetrics {
    /// labels: method, path, status
    pub http_requests_total: CounterVec,

    /// labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// labels: operation, statement, status
    pub db_operations_total: CounterVec,

    /// labels: operation, statement
    pub db_operation_duration_seconds: HistogramVec,

    /// labels: model, outcome (success / empty / persist_failed)
    pub recommendations_total: CounterVec,

    /// labels: model
    pub recommendation_duration_seconds: HistogramVec,

    pub cache_hits: Gauge,
    pub cache_misses: Gauge,
    pub cache_entries: Gauge,
    pub cache_evictions: Gauge,
    pub cache_capacity: Gauge,
}

fn registration_failed(name: &str, e: prometheus::Error) -> ApiError {
    ApiError::internal_error(format!("Failed to register {}: {}", name, e))
}

impl LecternMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "lectern_http_requests_total",
                "Total number of HTTP requests",
                &["method", "path", "status"]
            )
            .map_err(|e| registration_failed("http_requests_total", e))?,

            http_request_duration_seconds: register_histogram_vec!(
                "lectern_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| registration_failed("http_request_duration_seconds", e))?,

            db_operations_total: register_counter_vec!(
                "lectern_db_operations_total",
                "Total number of database operations",
                &["operation", "statement", "status"]
            )
            .map_err(|e| registration_failed("db_operations_total", e))?,

            db_operation_duration_seconds: register_histogram_vec!(
                "lectern_db_operation_duration_seconds",
                "Database operation duration in seconds",
                &["operation", "statement"],
                DB_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| registration_failed("db_operation_duration_seconds", e))?,

            recommendations_total: register_counter_vec!(
                "lectern_recommendations_total",
                "Recommendation requests by model and outcome",
                &["model", "outcome"]
            )
            .map_err(|e| registration_failed("recommendations_total", e))?,

            recommendation_duration_seconds: register_histogram_vec!(
                "lectern_recommendation_duration_seconds",
                "Time spent obtaining recommendations, all attempts included",
                &["model"],
                RECOMMENDATION_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| registration_failed("recommendation_duration_seconds", e))?,

            cache_hits: register_gauge!("lectern_cache_hits", "Composite history cache hits")
                .map_err(|e| registration_failed("cache_hits", e))?,

            cache_misses: register_gauge!("lectern_cache_misses", "Composite history cache misses")
                .map_err(|e| registration_failed("cache_misses", e))?,

            cache_entries: register_gauge!(
                "lectern_cache_entries",
                "Composite results currently cached"
            )
            .map_err(|e| registration_failed("cache_entries", e))?,

            cache_evictions: register_gauge!(
                "lectern_cache_evictions",
                "Composite results evicted to stay within capacity"
            )
            .map_err(|e| registration_failed("cache_evictions", e))?,

            cache_capacity: register_gauge!("lectern_cache_capacity", "Composite cache capacity")
                .map_err(|e| registration_failed("cache_capacity", e))?,
        })
    }

    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    pub fn record_db_operation(
        &self,
        operation: &str,
        statement: &str,
        success: bool,
        duration_secs: f64,
    ) {
        let status = if success { "success" } else { "error" };
        self.db_operations_total
            .with_label_values(&[operation, statement, status])
            .inc();
        self.db_operation_duration_seconds
            .with_label_values(&[operation, statement])
            .observe(duration_secs);
    }

    pub fn record_recommendation(&self, model: &str, outcome: &str, duration_secs: f64) {
        self.recommendations_total
            .with_label_values(&[model, outcome])
            .inc();
        self.recommendation_duration_seconds
            .with_label_values(&[model])
            .observe(duration_secs);
    }

    pub fn observe_cache(&self, stats: &CacheStats) {
        self.cache_hits.set(stats.hits as f64);
        self.cache_misses.set(stats.misses as f64);
        self.cache_entries.set(stats.entry_count as f64);
        self.cache_evictions.set(stats.evictions as f64);
        self.cache_capacity.set(stats.capacity as f64);
    }
}

/// Handler for GET /metrics endpoint.
///
/// Returns Prometheus text format metrics.
#[utoipa::path(
    get,
    path = "/metrics",
    tag = "Observability",
    responses(
        (status = 200, description = "Prometheus metrics in text format", content_type = "text/plain"),
        (status = 500, description = "Failed to encode metrics"),
    ),
)]
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    match (METRICS.as_ref(), state.cache.stats()) {
        (Ok(metrics), Ok(stats)) => metrics.observe_cache(&stats),
        (Err(e), _) => tracing::error!(error = %e, "Metrics unavailable"),
        (_, Err(e)) => tracing::warn!(error = %e, "Cache statistics unavailable"),
    }

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::core::Collector;

    fn metrics() -> Result<&'static LecternMetrics, String> {
        METRICS
            .as_ref()
            .map_err(|e| format!("Metrics init failed: {}", e.message))
    }

    #[test]
    fn test_metrics_creation() -> Result<(), String> {
        let metrics = metrics()?;
        assert!(!metrics.http_requests_total.desc().is_empty());
        Ok(())
    }

    #[test]
    fn test_record_http_request() -> Result<(), String> {
        let metrics = metrics()?;
        metrics.record_http_request("GET", "/api/v1/query/readers/{reader_id}", 200, 0.015);
        let count = metrics
            .http_requests_total
            .with_label_values(&["GET", "/api/v1/query/readers/{reader_id}", "200"])
            .get();
        assert!(count >= 1.0);
        Ok(())
    }

    #[test]
    fn test_record_recommendation() -> Result<(), String> {
        let metrics = metrics()?;
        metrics.record_recommendation("ollama", "success", 3.2);
        metrics.record_recommendation("ollama", "empty", 120.0);
        assert!(
            metrics
                .recommendations_total
                .with_label_values(&["ollama", "empty"])
                .get()
                >= 1.0
        );
        Ok(())
    }

    #[test]
    fn test_observe_cache() -> Result<(), String> {
        let metrics = metrics()?;
        metrics.observe_cache(&CacheStats {
            hits: 7,
            misses: 3,
            entry_count: 3,
            evictions: 1,
            capacity: 100,
        });
        assert_eq!(metrics.cache_capacity.get(), 100.0);
        Ok(())
    }
}
