//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define gateway metrics (requests, latency, health, rate limiting)
//! - Render the Prometheus text exposition for `/metrics`
//! - Track per-service and aggregate metrics
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, service, status
//! - `gateway_request_duration_seconds` (histogram): latency distribution
//! - `gateway_response_size_bytes` (histogram): response body sizes
//! - `gateway_upstream_retries_total` (counter): retries by service
//! - `gateway_health_checks_total` (counter): probes by service, result
//! - `gateway_health_check_duration_seconds` (histogram): probe latency
//! - `gateway_service_health` (gauge): 1=healthy, 0=unhealthy
//! - `gateway_rate_limited_total` (counter): rejections by identity class
//!
//! # Design Decisions
//! - One recorder per [`GatewayMetrics`], never installed process-wide
//! - Labels for method, service, status code; request paths stay in logs
//! - Histogram buckets tuned for typical web latencies

use metrics::{counter, gauge, histogram, with_local_recorder};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusRecorder};
use std::time::Duration;

const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

const SIZE_BUCKETS: &[f64] = &[
    128.0, 1024.0, 8192.0, 65536.0, 524288.0, 1048576.0, 10485760.0,
];

/// Gateway metrics sink, shared by `Arc` with every component that emits.
pub struct GatewayMetrics {
    recorder: PrometheusRecorder,
}

impl std::fmt::Debug for GatewayMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayMetrics").finish_non_exhaustive()
    }
}

impl GatewayMetrics {
    pub fn new() -> Self {
        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(Matcher::Suffix("_seconds".to_string()), LATENCY_BUCKETS)
            .and_then(|b| {
                b.set_buckets_for_metric(Matcher::Suffix("_bytes".to_string()), SIZE_BUCKETS)
            });

        let recorder = match builder {
            Ok(builder) => builder.build_recorder(),
            Err(e) => {
                tracing::warn!(error = %e, "Invalid histogram buckets, using summaries");
                PrometheusBuilder::new().build_recorder()
            }
        };

        Self { recorder }
    }

    /// Completed proxied request.
    pub fn record_request(
        &self,
        method: &str,
        service: &str,
        status: u16,
        latency: Duration,
        bytes: usize,
    ) {
        let method = method.to_string();
        let service = service.to_string();
        with_local_recorder(&self.recorder, || {
            counter!(
                "gateway_requests_total",
                "method" => method.clone(),
                "service" => service.clone(),
                "status" => status.to_string()
            )
            .increment(1);
            histogram!(
                "gateway_request_duration_seconds",
                "method" => method,
                "service" => service.clone()
            )
            .record(latency.as_secs_f64());
            histogram!("gateway_response_size_bytes", "service" => service).record(bytes as f64);
        });
    }

    /// One retry scheduled against a service.
    pub fn record_retry(&self, service: &str) {
        let service = service.to_string();
        with_local_recorder(&self.recorder, || {
            counter!("gateway_upstream_retries_total", "service" => service).increment(1);
        });
    }

    /// Health probe result.
    pub fn record_health_check(&self, service: &str, healthy: bool, latency: Duration) {
        let service = service.to_string();
        let result = if healthy { "success" } else { "failure" };
        with_local_recorder(&self.recorder, || {
            counter!(
                "gateway_health_checks_total",
                "service" => service.clone(),
                "result" => result
            )
            .increment(1);
            histogram!("gateway_health_check_duration_seconds", "service" => service.clone())
                .record(latency.as_secs_f64());
            gauge!("gateway_service_health", "service" => service)
                .set(if healthy { 1.0 } else { 0.0 });
        });
    }

    /// Rate-limit rejection, labelled by identity class (`user` or `ip`).
    pub fn record_rate_limited(&self, identity_class: &'static str) {
        with_local_recorder(&self.recorder, || {
            counter!("gateway_rate_limited_total", "identity_class" => identity_class).increment(1);
        });
    }

    /// Prometheus text exposition.
    pub fn render(&self) -> String {
        self.recorder.handle().render()
    }
}

impl Default for GatewayMetrics {
    fn default() -> Self {
        Self::new()
    }
}
