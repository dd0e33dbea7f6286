//! Retrying request forwarder.
//!
//! # Responsibilities
//! - Resolve the target service and refuse anything not healthy
//! - Build the outbound request (URL, filtered headers, forwarding headers)
//! - Execute with bounded retries and linear backoff
//! - Return the buffered response with hop-by-hop headers removed
//!
//! # Design Decisions
//! - Fail fast on unhealthy: no connection attempt, no retry budget spent
//! - Bodies are buffered up front so each attempt replays the same bytes
//! - Only transport failures are retried; a 5xx from the backend is returned as is
//! - The registry lock is never held across the outbound call

use axum::http::{HeaderMap, Method, StatusCode};
use bytes::Bytes;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time;

use crate::error::{GatewayError, GatewayResult};
use crate::observability::metrics::GatewayMetrics;
use crate::proxy::transport::{OutboundRequest, Transport, TransportError, TransportResponse};
use crate::registry::{ServiceRegistry, ServiceStatus};
use crate::resilience::RetryPolicy;
use crate::security::headers::{forward_request_headers, strip_hop_by_hop};

/// One inbound call to forward.
#[derive(Debug, Clone)]
pub struct ForwardRequest {
    pub service: String,
    pub method: Method,
    /// Backend path, always starting with `/`.
    pub path: String,
    /// Raw query string, forwarded verbatim.
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub client_ip: Option<IpAddr>,
    /// Inbound request URI, sent as `X-Original-URI`.
    pub original_uri: String,
    /// Per-attempt deadline.
    pub timeout: Duration,
    pub max_retries: u32,
}

/// Normalized backend response.
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Wall time across all attempts, backoff included.
    pub response_time: Duration,
    pub attempts: u32,
}

/// Forwards requests to registered services.
pub struct ProxyForwarder {
    registry: Arc<ServiceRegistry>,
    transport: Arc<dyn Transport>,
    metrics: Arc<GatewayMetrics>,
    staleness: Duration,
    backoff_step: Duration,
    require_probe: bool,
}

/// Metrics label for requests that never resolved to a registered service.
pub const UNROUTED_SERVICE: &str = "unrouted";

impl ProxyForwarder {
    pub fn new(
        registry: Arc<ServiceRegistry>,
        transport: Arc<dyn Transport>,
        metrics: Arc<GatewayMetrics>,
        staleness: Duration,
        backoff_step: Duration,
    ) -> Self {
        Self {
            registry,
            transport,
            metrics,
            staleness,
            backoff_step,
            require_probe: true,
        }
    }

    /// Whether a service needs a fresh healthy probe before it is forwarded to.
    ///
    /// Turned off when active health checks are disabled: `Unknown` is then
    /// forwarded, while an explicit `Unhealthy` verdict still fails fast.
    pub fn require_probe(mut self, required: bool) -> Self {
        self.require_probe = required;
        self
    }

    fn admits(&self, status: ServiceStatus) -> bool {
        match status {
            ServiceStatus::Healthy => true,
            ServiceStatus::Unknown => !self.require_probe,
            ServiceStatus::Unhealthy => false,
        }
    }

    /// Forward `request` to its service.
    pub async fn forward(&self, request: ForwardRequest) -> GatewayResult<ProxyResponse> {
        let start = Instant::now();
        let descriptor = match self.registry.get(&request.service) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                self.metrics.record_request(
                    request.method.as_str(),
                    UNROUTED_SERVICE,
                    StatusCode::NOT_FOUND.as_u16(),
                    start.elapsed(),
                    0,
                );
                return Err(e);
            }
        };

        let status = descriptor.status(self.staleness);
        if !self.admits(status) {
            tracing::warn!(
                service = %request.service,
                status = %status,
                "Refusing to forward to service that is not healthy"
            );
            self.metrics.record_request(
                request.method.as_str(),
                &request.service,
                StatusCode::SERVICE_UNAVAILABLE.as_u16(),
                start.elapsed(),
                0,
            );
            return Err(GatewayError::ServiceUnavailable(request.service));
        }

        let url = match &request.query {
            Some(q) if !q.is_empty() => format!("{}{}?{}", descriptor.base_url, request.path, q),
            _ => format!("{}{}", descriptor.base_url, request.path),
        };
        let headers =
            forward_request_headers(&request.headers, request.client_ip, &request.original_uri);
        let outbound = OutboundRequest {
            method: request.method.clone(),
            url,
            headers,
            body: request.body,
            timeout: request.timeout,
        };

        let policy = RetryPolicy::new(request.max_retries, self.backoff_step);
        let result = self.execute_with_retry(&request.service, outbound, policy).await;
        let elapsed = start.elapsed();

        match result {
            Ok((response, attempts)) => {
                self.registry.record_call(&request.service, true);
                self.metrics.record_request(
                    request.method.as_str(),
                    &request.service,
                    response.status.as_u16(),
                    elapsed,
                    response.body.len(),
                );
                tracing::info!(
                    service = %request.service,
                    method = %request.method,
                    path = %request.path,
                    status = response.status.as_u16(),
                    attempts = attempts,
                    response_time = ?elapsed,
                    "Proxy request completed"
                );
                Ok(ProxyResponse {
                    status: response.status,
                    headers: strip_hop_by_hop(&response.headers),
                    body: response.body,
                    response_time: elapsed,
                    attempts,
                })
            }
            Err((source, attempts)) => {
                self.registry.record_call(&request.service, false);
                self.metrics.record_request(
                    request.method.as_str(),
                    &request.service,
                    StatusCode::BAD_GATEWAY.as_u16(),
                    elapsed,
                    0,
                );
                tracing::error!(
                    service = %request.service,
                    method = %request.method,
                    path = %request.path,
                    attempts = attempts,
                    error = %source,
                    "All forwarding attempts failed"
                );
                Err(GatewayError::UpstreamUnreachable {
                    service: request.service,
                    attempts,
                    source,
                })
            }
        }
    }

    async fn execute_with_retry(
        &self,
        service: &str,
        outbound: OutboundRequest,
        policy: RetryPolicy,
    ) -> Result<(TransportResponse, u32), (TransportError, u32)> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.transport.send(outbound.clone()).await {
                Ok(response) => return Ok((response, attempt)),
                Err(e) => match policy.delay_after(attempt) {
                    Some(delay) => {
                        tracing::warn!(
                            service = %service,
                            attempt = attempt,
                            delay = ?delay,
                            error = %e,
                            "Upstream request failed, retrying"
                        );
                        self.metrics.record_retry(service);
                        time::sleep(delay).await;
                    }
                    None => return Err((e, attempt)),
                },
            }
        }
    }
}
