//! Fixed-window rate limiting.
//!
//! # Responsibilities
//! - Count requests per client identity per window in a shared store
//! - Decide admission and the remaining budget
//! - Reject over-budget requests before they reach the forwarder
//!
//! # Design Decisions
//! - Fixed window: one atomic increment per request, at the cost of allowing
//!   up to twice the budget across a window boundary
//! - Fail open: if the store errors, the request is admitted and a warning
//!   is logged
//! - No local locking; atomicity is the store's job

use axum::{
    body::Body,
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::GatewayError;
use crate::http::request::request_id;
use crate::http::response::{ErrorResponse, X_RATELIMIT_REMAINING};
use crate::observability::metrics::GatewayMetrics;
use crate::security::counter_store::CounterStore;
use crate::security::identity::ClientIdentity;

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub allowed: bool,
    pub remaining: u64,
    /// Unix seconds at which the client may expect a fresh window.
    pub reset_at: u64,
}

/// Admission filter in front of the forwarder.
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    budget: u64,
    window: Duration,
    metrics: Arc<GatewayMetrics>,
}

impl RateLimiter {
    pub fn new(
        store: Arc<dyn CounterStore>,
        budget: u64,
        window: Duration,
        metrics: Arc<GatewayMetrics>,
    ) -> Self {
        Self {
            store,
            budget,
            window,
            metrics,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Count this request against `identity` and decide admission.
    pub async fn check_admission(&self, identity: &ClientIdentity) -> Admission {
        let reset_at = unix_now().saturating_add(self.window.as_secs().max(1));

        match self.store.incr_with_expiry(&identity.key(), self.window).await {
            Ok(count) => Admission {
                allowed: count <= self.budget,
                remaining: self.budget.saturating_sub(count),
                reset_at,
            },
            Err(e) => {
                tracing::warn!(
                    identity = %identity,
                    error = %e,
                    "Rate limit store unavailable, admitting request"
                );
                Admission {
                    allowed: true,
                    remaining: self.budget,
                    reset_at,
                }
            }
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Reject over-budget requests with 429; annotate admitted ones with the
/// remaining budget.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let identity = ClientIdentity::from_request(&request);
    let admission = limiter.check_admission(&identity).await;

    if !admission.allowed {
        tracing::warn!(client = %identity, reset_at = admission.reset_at, "Rate limit exceeded");
        limiter.metrics.record_rate_limited(identity.class());
        let err = GatewayError::RateLimitExceeded {
            remaining: 0,
            reset_at: admission.reset_at,
            retry_after: limiter.window,
        };
        return ErrorResponse::from(&err)
            .with_request_id(request_id(request.headers()))
            .into_response();
    }

    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert(X_RATELIMIT_REMAINING, HeaderValue::from(admission.remaining));
    response
}
