//! Outbound HTTP transport.
//!
//! # Responsibilities
//! - Execute one outbound request with a deadline
//! - Buffer the full response body
//! - Bound pooled idle connections and concurrent connections per host
//!
//! # Design Decisions
//! - [`Transport`] is the seam between the core and the network; tests
//!   substitute counting mocks
//! - The deadline covers connect, headers and body
//! - Plain HTTP only; backends live inside the trust boundary

use async_trait::async_trait;
use axum::http::{HeaderMap, Method, Request, StatusCode, Uri};
use bytes::Bytes;
use dashmap::DashMap;
use http_body_util::{BodyExt, Full};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::{TokioExecutor, TokioTimer},
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::time;

/// A fully buffered outbound request.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Deadline for this single attempt.
    pub timeout: Duration,
}

impl OutboundRequest {
    /// Body-less GET, as used by liveness probes.
    pub fn get(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            timeout,
        }
    }
}

/// A fully buffered upstream response.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Transport-level failures. HTTP error statuses are not failures here.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("request failed: {0}")]
    Request(String),

    #[error("failed to read response body: {0}")]
    Body(String),
}

/// Executes outbound HTTP requests.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: OutboundRequest) -> Result<TransportResponse, TransportError>;
}

/// Connection pool limits for a [`HyperTransport`].
#[derive(Debug, Clone, Copy)]
pub struct PoolSettings {
    pub max_idle_per_host: usize,
    pub idle_timeout: Duration,
    pub max_connections_per_host: usize,
}

/// Pooled hyper client with a per-host concurrency cap.
pub struct HyperTransport {
    client: Client<HttpConnector, Full<Bytes>>,
    host_limits: DashMap<String, Arc<Semaphore>>,
    max_connections_per_host: usize,
}

impl HyperTransport {
    pub fn new(settings: PoolSettings) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new())
            .pool_timer(TokioTimer::new())
            .pool_idle_timeout(settings.idle_timeout)
            .pool_max_idle_per_host(settings.max_idle_per_host)
            .build(connector);

        Self {
            client,
            host_limits: DashMap::new(),
            max_connections_per_host: settings.max_connections_per_host.max(1),
        }
    }

    fn host_limit(&self, authority: &str) -> Arc<Semaphore> {
        self.host_limits
            .entry(authority.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(self.max_connections_per_host)))
            .value()
            .clone()
    }

    async fn execute(
        &self,
        uri: Uri,
        limit: Arc<Semaphore>,
        request: OutboundRequest,
    ) -> Result<TransportResponse, TransportError> {
        let _permit = limit
            .acquire_owned()
            .await
            .map_err(|_| TransportError::Request("host connection limiter closed".into()))?;

        let mut builder = Request::builder().method(request.method).uri(uri);
        if let Some(headers) = builder.headers_mut() {
            *headers = request.headers;
        }
        let req = builder
            .body(Full::new(request.body))
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let response = self
            .client
            .request(req)
            .await
            .map_err(|e| TransportError::Request(error_chain(&e)))?;

        let (parts, body) = response.into_parts();
        let body = body
            .collect()
            .await
            .map_err(|e| TransportError::Body(error_chain(&e)))?
            .to_bytes();

        Ok(TransportResponse {
            status: parts.status,
            headers: parts.headers,
            body,
        })
    }
}

#[async_trait]
impl Transport for HyperTransport {
    async fn send(&self, request: OutboundRequest) -> Result<TransportResponse, TransportError> {
        let uri: Uri = request.url.parse().map_err(|e: axum::http::uri::InvalidUri| {
            TransportError::InvalidUrl {
                url: request.url.clone(),
                reason: e.to_string(),
            }
        })?;
        let authority = uri
            .authority()
            .map(|a| a.to_string())
            .ok_or_else(|| TransportError::InvalidUrl {
                url: request.url.clone(),
                reason: "missing host".into(),
            })?;

        let timeout = request.timeout;
        let limit = self.host_limit(&authority);
        time::timeout(timeout, self.execute(uri, limit, request))
            .await
            .map_err(|_| TransportError::Timeout(timeout))?
    }
}

/// Render an error with its source chain; hyper's top-level messages are terse.
fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn transport() -> HyperTransport {
        HyperTransport::new(PoolSettings {
            max_idle_per_host: 1,
            idle_timeout: Duration::from_secs(5),
            max_connections_per_host: 2,
        })
    }

    async fn one_shot_backend(response: &'static str) -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        addr
    }

    #[tokio::test]
    async fn buffers_status_headers_and_body() {
        let addr = one_shot_backend(
            "HTTP/1.1 201 Created\r\nContent-Length: 5\r\nX-Backend: yes\r\nConnection: close\r\n\r\nhello",
        )
        .await;

        let resp = transport()
            .send(OutboundRequest::get(format!("http://{}/x", addr), Duration::from_secs(2)))
            .await
            .unwrap();

        assert_eq!(resp.status, StatusCode::CREATED);
        assert_eq!(resp.headers["x-backend"], "yes");
        assert_eq!(&resp.body[..], b"hello");
    }

    #[tokio::test]
    async fn refused_connection_is_request_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = transport()
            .send(OutboundRequest::get(format!("http://{}/", addr), Duration::from_secs(2)))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Request(_)), "{err}");
    }

    #[tokio::test]
    async fn silent_backend_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            time::sleep(Duration::from_secs(10)).await;
        });

        let err = transport()
            .send(OutboundRequest::get(format!("http://{}/", addr), Duration::from_millis(200)))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Timeout(_)));
    }

    #[tokio::test]
    async fn garbage_url_is_invalid() {
        let err = transport()
            .send(OutboundRequest::get("not a url", Duration::from_secs(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::InvalidUrl { .. }));
    }
}
