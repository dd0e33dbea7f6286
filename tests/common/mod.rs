//! Shared utilities for integration tests.

#![allow(dead_code)]

use axum::{
    extract::Request,
    http::{HeaderMap, StatusCode},
    routing::get,
    Router,
};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use api_gateway::config::{GatewayConfig, ServiceConfig};
use api_gateway::http::HttpServer;
use api_gateway::lifecycle::Shutdown;

/// Start a raw TCP backend that answers every request with `response`
/// verbatim after reading the request head.
pub async fn start_mock_backend(response: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    addr
}

/// Start a raw TCP backend that answers health probes with 200 and drops
/// every other connection without a response.
pub async fn start_black_hole_backend(health_path: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let n = socket.read(&mut buf).await.unwrap_or(0);
                let head = String::from_utf8_lossy(&buf[..n]);
                if head.starts_with(&format!("GET {} ", health_path)) {
                    let _ = socket
                        .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok")
                        .await;
                }
                let _ = socket.shutdown().await;
            });
        }
    });
    addr
}

/// What a recording backend saw.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub uri: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

/// Start an axum backend with a `/healthz` endpoint that records every
/// other request and answers `200 order <path>`.
pub async fn start_recording_backend() -> (SocketAddr, Arc<Mutex<Vec<RecordedRequest>>>) {
    let seen: Arc<Mutex<Vec<RecordedRequest>>> = Arc::new(Mutex::new(Vec::new()));
    let recorder = seen.clone();

    let app = Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .fallback(move |request: Request| {
            let recorder = recorder.clone();
            async move {
                let (parts, body) = request.into_parts();
                let body = axum::body::to_bytes(body, 1024 * 1024).await.unwrap_or_default();
                recorder.lock().push(RecordedRequest {
                    method: parts.method.to_string(),
                    uri: parts.uri.to_string(),
                    headers: parts.headers,
                    body: body.to_vec(),
                });
                (
                    StatusCode::OK,
                    [("x-backend", "orders")],
                    format!("order {}", parts.uri.path()),
                )
            }
        });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (addr, seen)
}

pub fn service(name: &str, addr: SocketAddr, health_path: &str) -> ServiceConfig {
    ServiceConfig {
        name: name.to_string(),
        base_url: format!("http://{}", addr),
        health_path: health_path.to_string(),
        timeout_secs: Some(2),
        retry_count: Some(0),
    }
}

/// Config suited to tests: fast health ticks, short grace, generous limits.
pub fn test_config(services: Vec<ServiceConfig>) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.services = services;
    config.health_check.interval_secs = 1;
    config.health_check.timeout_secs = 1;
    config.proxy.backoff_step_ms = 10;
    config.rate_limit.requests_per_second = 1000;
    config.shutdown.grace_period_secs = 2;
    config
}

/// A running gateway.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<std::io::Result<()>>,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Trigger shutdown and wait for the server to return.
    pub async fn stop(self) -> std::io::Result<()> {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(10), self.handle)
            .await
            .expect("gateway did not stop")
            .expect("gateway task panicked")
    }
}

pub async fn start_gateway(config: GatewayConfig) -> TestGateway {
    let server = HttpServer::new(config).expect("gateway config");
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let handle = tokio::spawn(server.run(listener, shutdown.clone()));
    TestGateway {
        addr,
        shutdown,
        handle,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Poll the gateway's `/health` until `service` reports `status`.
pub async fn wait_for_status(gateway: &TestGateway, service: &str, status: &str) {
    let client = client();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if let Ok(res) = client.get(gateway.url("/health")).send().await {
            if let Ok(body) = res.json::<serde_json::Value>().await {
                let matched = body["services"]
                    .as_array()
                    .into_iter()
                    .flatten()
                    .any(|s| s["name"] == service && s["status"] == status);
                if matched {
                    return;
                }
            }
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "service {service} never became {status}"
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
