//! Gateway error taxonomy.
//!
//! Every failure the routing and resilience core can surface to a caller is a
//! [`GatewayError`]. The HTTP mapping lives in [`crate::http::response`].

use std::time::Duration;
use thiserror::Error;

use crate::proxy::transport::TransportError;

/// Errors surfaced by the registry, forwarder and admission filter.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// No registry entry for the requested service.
    #[error("service '{0}' not found")]
    ServiceUnknown(String),

    /// Service is registered but its derived status is not healthy.
    #[error("service '{0}' is unavailable")]
    ServiceUnavailable(String),

    /// Every forwarding attempt failed at the transport level.
    #[error("service '{service}' unreachable after {attempts} attempt(s): {source}")]
    UpstreamUnreachable {
        service: String,
        attempts: u32,
        #[source]
        source: TransportError,
    },

    /// Admission denied by the rate limiter.
    #[error("rate limit exceeded, resets at {reset_at}")]
    RateLimitExceeded {
        /// Always zero on rejection.
        remaining: u64,
        /// Unix timestamp (seconds) at which the window resets.
        reset_at: u64,
        /// Window length, reported as `Retry-After`.
        retry_after: Duration,
    },

    /// A service with the same name is already registered.
    #[error("service '{0}' already registered")]
    RegistryConflict(String),

    /// Inbound request body exceeded the buffering limit.
    #[error("request body exceeds {0} bytes")]
    PayloadTooLarge(usize),

    /// Inbound request could not be routed or read.
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Stable machine-readable code used in error bodies and logs.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::ServiceUnknown(_) => "SERVICE_UNKNOWN",
            GatewayError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            GatewayError::UpstreamUnreachable { .. } => "UPSTREAM_UNREACHABLE",
            GatewayError::RateLimitExceeded { .. } => "RATE_LIMIT_EXCEEDED",
            GatewayError::RegistryConflict(_) => "REGISTRY_CONFLICT",
            GatewayError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            GatewayError::BadRequest(_) => "BAD_REQUEST",
            GatewayError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;
