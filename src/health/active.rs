//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every registered service
//! - Commit each verdict to the registry
//! - Answer on-demand checks with the same semantics
//!
//! # Design Decisions
//! - One spawned task per service per tick; a slow probe never delays others
//! - A failed probe is not retried within the tick; the next tick is the retry
//! - In-flight probes are not aborted on shutdown, their results still land
//! - No per-service state lives here; the registry owns it all

use axum::http::{HeaderValue, StatusCode};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::config::HealthCheckConfig;
use crate::error::GatewayResult;
use crate::observability::metrics::GatewayMetrics;
use crate::proxy::transport::{OutboundRequest, Transport};
use crate::registry::{ServiceDescriptor, ServiceRegistry};

const PROBE_USER_AGENT: &str = "api-gateway-health-check";

pub struct HealthMonitor {
    registry: Arc<ServiceRegistry>,
    transport: Arc<dyn Transport>,
    config: HealthCheckConfig,
    metrics: Arc<GatewayMetrics>,
}

impl HealthMonitor {
    pub fn new(
        registry: Arc<ServiceRegistry>,
        transport: Arc<dyn Transport>,
        config: HealthCheckConfig,
        metrics: Arc<GatewayMetrics>,
    ) -> Self {
        Self {
            registry,
            transport,
            config,
            metrics,
        }
    }

    /// Tick until `shutdown` fires. The first tick runs immediately.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        if !self.config.enabled {
            tracing::info!("Active health checks disabled");
            return;
        }

        tracing::info!(
            interval = self.config.interval_secs,
            timeout = self.config.timeout_secs,
            "Health monitor starting"
        );

        let mut ticker = time::interval(Duration::from_secs(self.config.interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.wait_for(|stop| *stop) => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
                _ = ticker.tick() => {
                    let probes = self.tick();
                    tracing::debug!(count = probes.len(), "Health probes dispatched");
                }
            }
        }
    }

    /// Dispatch one probe task per registered service.
    pub fn tick(self: &Arc<Self>) -> Vec<JoinHandle<bool>> {
        self.registry
            .list_all()
            .into_iter()
            .map(|service| {
                let monitor = Arc::clone(self);
                tokio::spawn(async move { monitor.probe(&service).await })
            })
            .collect()
    }

    /// Probe one service now and return its verdict.
    pub async fn check_service(&self, name: &str) -> GatewayResult<bool> {
        let service = self.registry.get(name)?;
        Ok(self.probe(&service).await)
    }

    async fn probe(&self, service: &ServiceDescriptor) -> bool {
        let timeout = Duration::from_secs(self.config.timeout_secs);
        let mut request = OutboundRequest::get(service.health_url(), timeout);
        request
            .headers
            .insert("user-agent", HeaderValue::from_static(PROBE_USER_AGENT));

        let start = Instant::now();
        let result = self.transport.send(request).await;
        let latency = start.elapsed();

        let healthy = match result {
            Ok(response) if response.status == StatusCode::OK => true,
            Ok(response) => {
                tracing::warn!(
                    service = %service.name(),
                    status = %response.status,
                    "Health check failed: non-200 status"
                );
                false
            }
            Err(e) => {
                tracing::warn!(service = %service.name(), error = %e, "Health check failed");
                false
            }
        };

        self.registry.update_health(service.name(), healthy, latency);
        self.metrics.record_health_check(service.name(), healthy, latency);
        tracing::debug!(
            service = %service.name(),
            healthy = healthy,
            latency = ?latency,
            "Health check completed"
        );
        healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Shutdown;
    use crate::proxy::transport::{TransportError, TransportResponse};
    use crate::registry::ServiceStatus;
    use async_trait::async_trait;
    use axum::http::HeaderMap;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Answers by host: `up` → 200, `degraded` → 503, anything else refuses.
    #[derive(Default)]
    struct ScriptedTransport {
        calls: AtomicU32,
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, request: OutboundRequest) -> Result<TransportResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let status = if request.url.starts_with("http://up") {
                StatusCode::OK
            } else if request.url.starts_with("http://degraded") {
                StatusCode::SERVICE_UNAVAILABLE
            } else {
                return Err(TransportError::Request("connection refused".into()));
            };
            Ok(TransportResponse {
                status,
                headers: HeaderMap::new(),
                body: Bytes::new(),
            })
        }
    }

    fn setup(interval_secs: u64) -> (Arc<HealthMonitor>, Arc<ServiceRegistry>, Arc<ScriptedTransport>) {
        let registry = Arc::new(ServiceRegistry::new());
        for (name, host) in [("orders", "up"), ("billing", "degraded"), ("ghost", "down")] {
            registry
                .register(name, ServiceDescriptor::new(name, format!("http://{host}:9000"), "/healthz"))
                .unwrap();
        }
        let transport = Arc::new(ScriptedTransport::default());
        let config = HealthCheckConfig {
            interval_secs,
            ..HealthCheckConfig::default()
        };
        let monitor = Arc::new(HealthMonitor::new(
            registry.clone(),
            transport.clone(),
            config,
            Arc::new(GatewayMetrics::new()),
        ));
        (monitor, registry, transport)
    }

    #[tokio::test]
    async fn tick_probes_every_service_and_commits_verdicts() {
        let (monitor, registry, transport) = setup(30);

        let results: Vec<bool> = futures_util::future::join_all(monitor.tick())
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        assert_eq!(results.len(), 3);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);

        let staleness = Duration::from_secs(300);
        assert_eq!(registry.get("orders").unwrap().status(staleness), ServiceStatus::Healthy);
        assert_eq!(registry.get("billing").unwrap().status(staleness), ServiceStatus::Unhealthy);
        let ghost = registry.get("ghost").unwrap();
        assert_eq!(ghost.status(staleness), ServiceStatus::Unhealthy);
        assert_eq!(ghost.error_count, 1);
        assert!(ghost.last_checked.is_some());
    }

    #[tokio::test]
    async fn on_demand_check_uses_same_rules() {
        let (monitor, registry, _) = setup(30);

        assert!(monitor.check_service("orders").await.unwrap());
        assert!(!monitor.check_service("billing").await.unwrap());
        assert!(monitor.check_service("missing").await.is_err());
        assert_eq!(registry.get("orders").unwrap().success_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_ticking_after_shutdown() {
        let (monitor, _, transport) = setup(10);
        let shutdown = Shutdown::new();

        let handle = tokio::spawn(monitor.run(shutdown.subscribe()));
        // first tick is immediate, second at t=10s
        time::sleep(Duration::from_secs(15)).await;
        tokio::task::yield_now().await;
        assert_eq!(transport.calls.load(Ordering::SeqCst), 6);

        shutdown.trigger();
        handle.await.unwrap();

        time::sleep(Duration::from_secs(60)).await;
        assert_eq!(transport.calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn disabled_monitor_returns_immediately() {
        let (monitor, _, transport) = setup(30);
        let monitor = Arc::new(HealthMonitor {
            registry: monitor.registry.clone(),
            transport: transport.clone(),
            config: HealthCheckConfig {
                enabled: false,
                ..HealthCheckConfig::default()
            },
            metrics: Arc::new(GatewayMetrics::new()),
        });
        let shutdown = Shutdown::new();

        monitor.run(shutdown.subscribe()).await;
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }
}
