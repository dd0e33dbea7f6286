//! Client identity.
//!
//! # Responsibilities
//! - Lift an already-authenticated user id into request extensions
//! - Resolve the identity the rate limiter counts against
//!
//! # Design Decisions
//! - Token verification happens upstream of the gateway; only the resulting
//!   user id header is trusted, and only when configured
//! - User and IP identities live in separate key namespaces

use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use crate::config::IdentityConfig;

/// Authenticated user id attached by [`identity_middleware`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser(pub String);

/// Who a request is counted against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientIdentity {
    User(String),
    Ip(IpAddr),
    /// No user and no peer address (in-process callers).
    Unknown,
}

impl ClientIdentity {
    /// Resolve from extensions: user first, then peer IP.
    pub fn from_request<B>(request: &axum::http::Request<B>) -> Self {
        if let Some(user) = request.extensions().get::<AuthenticatedUser>() {
            return ClientIdentity::User(user.0.clone());
        }
        match request.extensions().get::<ConnectInfo<SocketAddr>>() {
            Some(ConnectInfo(addr)) => ClientIdentity::Ip(addr.ip()),
            None => ClientIdentity::Unknown,
        }
    }

    /// Counter key.
    pub fn key(&self) -> String {
        match self {
            ClientIdentity::User(id) => format!("ratelimit:user:{}", id),
            ClientIdentity::Ip(ip) => format!("ratelimit:ip:{}", ip),
            ClientIdentity::Unknown => "ratelimit:ip:unknown".to_string(),
        }
    }

    /// Metric label.
    pub fn class(&self) -> &'static str {
        match self {
            ClientIdentity::User(_) => "user",
            ClientIdentity::Ip(_) | ClientIdentity::Unknown => "ip",
        }
    }
}

impl std::fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientIdentity::User(id) => write!(f, "user:{}", id),
            ClientIdentity::Ip(ip) => write!(f, "ip:{}", ip),
            ClientIdentity::Unknown => f.write_str("unknown"),
        }
    }
}

/// Copy the configured user header into an [`AuthenticatedUser`] extension.
pub async fn identity_middleware(
    State(config): State<Arc<IdentityConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let user = config.user_header.as_deref().and_then(|name| {
        request
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    });
    if let Some(user) = user {
        request.extensions_mut().insert(AuthenticatedUser(user));
    }
    next.run(request).await
}
