//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build every core component from configuration (startup)
//! - Create the Axum router: `/health`, `/metrics` and the proxy routes
//! - Wire up middleware (request ID, tracing, body limit, identity, rate limit)
//! - Run the health monitor and counter sweeper alongside the listener
//! - Drain in-flight requests on shutdown within the grace period

use axum::{
    body::{self, Body},
    extract::{ConnectInfo, State},
    http::{header, Request, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use http_body_util::LengthLimitError;
use serde::Serialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::time;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::{CallPolicy, GatewayConfig};
use crate::error::{GatewayError, GatewayResult};
use crate::health::HealthMonitor;
use crate::http::request::{request_id, MakeRequestUuid, X_REQUEST_ID};
use crate::http::response::ErrorResponse;
use crate::lifecycle::shutdown::{signalled, Shutdown};
use crate::observability::metrics::GatewayMetrics;
use crate::proxy::forwarder::{ForwardRequest, ProxyForwarder, UNROUTED_SERVICE};
use crate::proxy::transport::{HyperTransport, PoolSettings, Transport};
use crate::registry::{ServiceRegistry, ServiceStatus};
use crate::routing::Router as ServiceRouter;
use crate::security::counter_store::{CounterStore, MemoryCounterStore, RedisCounterStore};
use crate::security::identity::identity_middleware;
use crate::security::rate_limit::{rate_limit_middleware, RateLimiter};

const COUNTER_SWEEP_INTERVAL: Duration = Duration::from_secs(10);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub registry: Arc<ServiceRegistry>,
    pub forwarder: Arc<ProxyForwarder>,
    pub monitor: Arc<HealthMonitor>,
    pub metrics: Arc<GatewayMetrics>,
    pub router: Arc<ServiceRouter>,
    policies: Arc<HashMap<String, CallPolicy>>,
    default_policy: CallPolicy,
    pub started_at: Instant,
}

impl AppState {
    /// Timeout and retry policy for `service`.
    pub fn call_policy(&self, service: &str) -> CallPolicy {
        self.policies
            .get(service)
            .copied()
            .unwrap_or(self.default_policy)
    }
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    state: AppState,
    memory_store: Option<Arc<MemoryCounterStore>>,
}

impl HttpServer {
    /// Build the gateway from configuration.
    ///
    /// Registers every configured service; a duplicate name is fatal.
    pub fn new(config: GatewayConfig) -> GatewayResult<Self> {
        let metrics = Arc::new(GatewayMetrics::new());
        let registry = Arc::new(ServiceRegistry::from_config(&config.services)?);

        let proxy_transport: Arc<dyn Transport> = Arc::new(HyperTransport::new(PoolSettings {
            max_idle_per_host: config.proxy.max_idle_per_host,
            idle_timeout: Duration::from_secs(config.proxy.idle_timeout_secs),
            max_connections_per_host: config.proxy.max_connections_per_host,
        }));
        let health_transport: Arc<dyn Transport> = Arc::new(HyperTransport::new(PoolSettings {
            max_idle_per_host: config.health_check.max_idle_per_host,
            idle_timeout: Duration::from_secs(config.proxy.idle_timeout_secs),
            max_connections_per_host: config.health_check.max_connections_per_host,
        }));

        Self::with_transports(config, registry, metrics, proxy_transport, health_transport)
    }

    /// Build the gateway with caller-supplied transports.
    pub fn with_transports(
        config: GatewayConfig,
        registry: Arc<ServiceRegistry>,
        metrics: Arc<GatewayMetrics>,
        proxy_transport: Arc<dyn Transport>,
        health_transport: Arc<dyn Transport>,
    ) -> GatewayResult<Self> {
        let config = Arc::new(config);

        let forwarder = Arc::new(
            ProxyForwarder::new(
                registry.clone(),
                proxy_transport,
                metrics.clone(),
                config.health_check.staleness(),
                config.proxy.backoff_step(),
            )
            .require_probe(config.health_check.enabled),
        );
        let monitor = Arc::new(HealthMonitor::new(
            registry.clone(),
            health_transport,
            config.health_check.clone(),
            metrics.clone(),
        ));

        let (limiter, memory_store) = Self::build_limiter(&config, metrics.clone())?;

        let policies = config
            .services
            .iter()
            .map(|s| (s.name.clone(), config.call_policy(s)))
            .collect::<HashMap<_, _>>();
        let default_policy = CallPolicy {
            timeout: Duration::from_secs(config.proxy.timeout_secs),
            max_retries: config.proxy.retry_count,
        };

        let state = AppState {
            router: Arc::new(ServiceRouter::new(&config.proxy.route_prefix)),
            config: config.clone(),
            registry,
            forwarder,
            monitor,
            metrics,
            policies: Arc::new(policies),
            default_policy,
            started_at: Instant::now(),
        };

        let router = Self::build_router(&config, state.clone(), limiter);
        Ok(Self {
            router,
            state,
            memory_store,
        })
    }

    fn build_limiter(
        config: &GatewayConfig,
        metrics: Arc<GatewayMetrics>,
    ) -> GatewayResult<(Option<Arc<RateLimiter>>, Option<Arc<MemoryCounterStore>>)> {
        let rl = &config.rate_limit;
        if !rl.enabled {
            tracing::info!("Rate limiting disabled");
            return Ok((None, None));
        }

        let (store, memory): (Arc<dyn CounterStore>, _) = match &rl.redis_url {
            Some(url) => {
                let store = RedisCounterStore::new(url, Duration::from_millis(rl.store_timeout_ms))
                    .map_err(|e| GatewayError::Internal(format!("invalid redis url: {}", e)))?;
                tracing::info!("Rate limit counters stored in redis");
                (Arc::new(store), None)
            }
            None => {
                let store = Arc::new(MemoryCounterStore::new());
                tracing::info!("Rate limit counters stored in process memory");
                (store.clone(), Some(store))
            }
        };

        let budget = u64::from(rl.requests_per_second);
        let limiter = RateLimiter::new(store, budget, rl.window(), metrics);
        Ok((Some(Arc::new(limiter)), memory))
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(
        config: &GatewayConfig,
        state: AppState,
        limiter: Option<Arc<RateLimiter>>,
    ) -> Router {
        let mut proxy = Router::new()
            .route("/", any(proxy_handler))
            .route("/{*path}", any(proxy_handler))
            .with_state(state.clone());
        if let Some(limiter) = limiter {
            proxy = proxy.layer(middleware::from_fn_with_state(limiter, rate_limit_middleware));
        }
        let proxy = proxy.layer(middleware::from_fn_with_state(
            Arc::new(config.identity.clone()),
            identity_middleware,
        ));

        Router::new()
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(state)
            .merge(proxy)
            .layer(RequestBodyLimitLayer::new(config.proxy.max_body_bytes))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run the server, accepting connections on the given listener, until
    /// `shutdown` fires and in-flight requests drain or the grace period ends.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> std::io::Result<()> {
        let addr = listener.local_addr()?;
        let grace = Duration::from_secs(self.state.config.shutdown.grace_period_secs);
        tracing::info!(
            address = %addr,
            services = self.state.registry.len(),
            "HTTP server starting"
        );

        let monitor_task = tokio::spawn(self.state.monitor.clone().run(shutdown.subscribe()));
        if let Some(store) = self.memory_store.clone() {
            tokio::spawn(store.run_sweeper(COUNTER_SWEEP_INTERVAL, shutdown.subscribe()));
        }

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        let stop_accepting = signalled(shutdown.subscribe());
        let stop_requested = signalled(shutdown.subscribe());
        let mut server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(stop_accepting)
                .await
        });

        tokio::select! {
            res = &mut server => {
                let _ = monitor_task.await;
                return flatten(res);
            }
            _ = stop_requested => {}
        }

        tracing::info!(grace = ?grace, "Shutdown signal received, draining in-flight requests");
        match time::timeout(grace, &mut server).await {
            Ok(res) => flatten(res)?,
            Err(_) => {
                tracing::warn!("Grace period elapsed, aborting remaining requests");
                server.abort();
            }
        }

        let _ = monitor_task.await;
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

fn flatten(res: Result<std::io::Result<()>, tokio::task::JoinError>) -> std::io::Result<()> {
    match res {
        Ok(inner) => inner,
        Err(e) => Err(std::io::Error::other(e)),
    }
}

/// Render `err` as the uniform JSON error body.
pub(crate) fn error_response(err: &GatewayError, request_id: Option<String>) -> Response {
    ErrorResponse::from(err)
        .with_request_id(request_id)
        .into_response()
}

fn is_length_limit(err: &axum::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = source {
        if e.is::<LengthLimitError>() {
            return true;
        }
        source = e.source();
    }
    false
}

/// Main proxy handler.
/// Resolves the service from the path, buffers the body and forwards.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let started = Instant::now();
    let request_id = request_id(request.headers());
    let (parts, body) = request.into_parts();

    let Some(target) = state.router.resolve(parts.uri.path()) else {
        tracing::warn!(
            request_id = ?request_id,
            path = %parts.uri.path(),
            "No service in request path"
        );
        let err = GatewayError::ServiceUnknown(parts.uri.path().to_string());
        state.metrics.record_request(
            parts.method.as_str(),
            UNROUTED_SERVICE,
            StatusCode::NOT_FOUND.as_u16(),
            started.elapsed(),
            0,
        );
        return error_response(&err, request_id);
    };

    let max_body = state.config.proxy.max_body_bytes;
    let body = match body::to_bytes(body, max_body).await {
        Ok(bytes) => bytes,
        Err(e) => {
            let err = if is_length_limit(&e) {
                GatewayError::PayloadTooLarge(max_body)
            } else {
                GatewayError::BadRequest(format!("failed to read request body: {}", e))
            };
            state.metrics.record_request(
                parts.method.as_str(),
                &target.service,
                ErrorResponse::from(&err).status,
                started.elapsed(),
                0,
            );
            return error_response(&err, request_id);
        }
    };

    let policy = state.call_policy(&target.service);
    let client_ip = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let original_uri = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| parts.uri.path().to_string());

    let forward = ForwardRequest {
        service: target.service,
        method: parts.method,
        path: target.path,
        query: parts.uri.query().map(str::to_string),
        headers: parts.headers,
        body,
        client_ip,
        original_uri,
        timeout: policy.timeout,
        max_retries: policy.max_retries,
    };

    match state.forwarder.forward(forward).await {
        Ok(resp) => {
            let mut response = Response::new(Body::from(resp.body));
            *response.status_mut() = resp.status;
            *response.headers_mut() = resp.headers;
            response
        }
        Err(err) => error_response(&err, request_id),
    }
}

#[derive(Debug, Serialize)]
struct ServiceHealth {
    name: String,
    status: ServiceStatus,
    last_checked: Option<u64>,
    response_time_ms: u128,
}

#[derive(Debug, Serialize)]
struct GatewayHealth {
    status: &'static str,
    version: &'static str,
    uptime_secs: u64,
    services: Vec<ServiceHealth>,
}

/// Gateway liveness plus the derived status of every service.
async fn health_handler(State(state): State<AppState>) -> Json<GatewayHealth> {
    let staleness = state.config.health_check.staleness();
    let services = state
        .registry
        .list_all()
        .into_iter()
        .map(|s| ServiceHealth {
            status: s.status(staleness),
            last_checked: s.last_checked_unix(),
            response_time_ms: s.last_response_time.as_millis(),
            name: s.name().to_string(),
        })
        .collect();

    Json(GatewayHealth {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started_at.elapsed().as_secs(),
        services,
    })
}

/// Prometheus exposition.
async fn metrics_handler(State(state): State<AppState>) -> Response {
    if !state.config.observability.metrics_enabled {
        return StatusCode::NOT_FOUND.into_response();
    }
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;

    fn config() -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.services.push(ServiceConfig {
            name: "orders".into(),
            base_url: "http://127.0.0.1:9".into(),
            health_path: "/healthz".into(),
            timeout_secs: Some(2),
            retry_count: Some(0),
        });
        config
    }

    #[test]
    fn duplicate_service_is_fatal() {
        let mut config = config();
        let dup = config.services[0].clone();
        config.services.push(dup);
        assert!(matches!(
            HttpServer::new(config),
            Err(GatewayError::RegistryConflict(_))
        ));
    }

    #[test]
    fn per_service_policy_overrides_proxy_defaults() {
        let server = HttpServer::new(config()).unwrap();
        let state = server.state();
        assert_eq!(
            state.call_policy("orders"),
            CallPolicy {
                timeout: Duration::from_secs(2),
                max_retries: 0
            }
        );
        assert_eq!(state.call_policy("other").max_retries, 3);
    }

    #[tokio::test]
    async fn shutdown_triggered_before_run_still_stops() {
        let server = HttpServer::new(config()).unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let shutdown = Shutdown::new();
        shutdown.trigger();

        let res = time::timeout(Duration::from_secs(5), server.run(listener, shutdown)).await;
        assert!(matches!(res, Ok(Ok(()))));
    }

    #[test]
    fn bad_redis_url_fails_startup() {
        let mut config = config();
        config.rate_limit.redis_url = Some("not a url".into());
        assert!(matches!(HttpServer::new(config), Err(GatewayError::Internal(_))));
    }
}
