//! Response handling and error rendering.
//!
//! # Responsibilities
//! - Map [`GatewayError`] to HTTP status codes
//! - Render a uniform JSON error body
//! - Attach rate-limit headers on 429
//!
//! # Design Decisions
//! - Error bodies are built with [`ErrorResponse`], an immutable value
//!   assembled through consuming `with_*` methods
//! - Upstream failures surface as 502, known-down services as 503

use axum::{
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::GatewayError;

/// `X-RateLimit-Remaining` header name.
pub const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
/// `X-RateLimit-Reset` header name.
pub const X_RATELIMIT_RESET: &str = "x-ratelimit-reset";

/// Uniform JSON error body.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub status: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip)]
    headers: HeaderMap,
}

impl ErrorResponse {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status: status.as_u16(),
            message: message.into(),
            error: None,
            details: None,
            request_id: None,
            headers: HeaderMap::new(),
        }
    }

    /// Attach the underlying error text.
    pub fn with_error(mut self, error: impl std::fmt::Display) -> Self {
        self.error = Some(error.to_string());
        self
    }

    /// Attach structured details.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Attach the inbound request id, if one was assigned.
    pub fn with_request_id(mut self, request_id: Option<String>) -> Self {
        self.request_id = request_id;
        self
    }

    /// Add a response header. Invalid values are dropped.
    pub fn with_header(mut self, name: &'static str, value: impl ToString) -> Self {
        if let Ok(v) = HeaderValue::from_str(&value.to_string()) {
            self.headers.insert(name, v);
        }
        self
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let headers = self.headers.clone();
        (status, headers, Json(self)).into_response()
    }
}

impl From<&GatewayError> for ErrorResponse {
    fn from(err: &GatewayError) -> Self {
        let details = serde_json::json!({ "code": err.code() });
        match err {
            GatewayError::ServiceUnknown(_) => {
                ErrorResponse::new(StatusCode::NOT_FOUND, "Service not found")
            }
            GatewayError::ServiceUnavailable(_) => {
                ErrorResponse::new(StatusCode::SERVICE_UNAVAILABLE, "Service unavailable")
            }
            GatewayError::UpstreamUnreachable { .. } => {
                ErrorResponse::new(StatusCode::BAD_GATEWAY, "Failed to reach service")
                    .with_error(err)
            }
            GatewayError::RateLimitExceeded { remaining, reset_at, retry_after } => {
                ErrorResponse::new(StatusCode::TOO_MANY_REQUESTS, "rate limit exceeded")
                    .with_header(X_RATELIMIT_REMAINING, remaining)
                    .with_header(X_RATELIMIT_RESET, reset_at)
                    .with_header("retry-after", retry_after.as_secs().max(1))
            }
            GatewayError::RegistryConflict(_) => {
                ErrorResponse::new(StatusCode::CONFLICT, "Service already registered")
            }
            GatewayError::PayloadTooLarge(_) => {
                ErrorResponse::new(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large")
                    .with_error(err)
            }
            GatewayError::BadRequest(_) => {
                ErrorResponse::new(StatusCode::BAD_REQUEST, "Bad request").with_error(err)
            }
            GatewayError::Internal(_) => {
                ErrorResponse::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
        .with_details(details)
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        ErrorResponse::from(&self).into_response()
    }
}
