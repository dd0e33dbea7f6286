//! Header manipulation.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers in both directions
//! - Add X-Forwarded-For and X-Original-URI
//!
//! # Design Decisions
//! - X-Forwarded-For is set to the peer address, never appended to
//!   client-supplied values
//! - Headers named in `Connection` are treated as hop-by-hop too
//! - `Host` is re-derived from the backend URL by the client

use axum::http::{
    header::{self, HeaderName, HeaderValue},
    HeaderMap,
};
use std::net::IpAddr;

/// `X-Forwarded-For` header name.
pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
/// `X-Original-URI` header name.
pub const X_ORIGINAL_URI: HeaderName = HeaderName::from_static("x-original-uri");

/// Connection-scoped headers that never cross the proxy.
pub const HOP_BY_HOP_HEADERS: [HeaderName; 9] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    HeaderName::from_static("trailers"),
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Returns true if `name` is in the fixed hop-by-hop set.
pub fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP_HEADERS.contains(name)
}

/// Copy `headers` without hop-by-hop entries.
pub fn strip_hop_by_hop(headers: &HeaderMap) -> HeaderMap {
    let connection_listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|token| HeaderName::from_bytes(token.trim().as_bytes()).ok())
        .collect();

    let mut out = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers.iter() {
        if is_hop_by_hop(name) || connection_listed.contains(name) {
            continue;
        }
        out.append(name.clone(), value.clone());
    }
    out
}

/// Build the header set sent to a backend.
pub fn forward_request_headers(
    inbound: &HeaderMap,
    client_ip: Option<IpAddr>,
    original_uri: &str,
) -> HeaderMap {
    let mut headers = strip_hop_by_hop(inbound);
    headers.remove(header::HOST);

    match client_ip.and_then(|ip| HeaderValue::from_str(&ip.to_string()).ok()) {
        Some(value) => {
            headers.insert(X_FORWARDED_FOR, value);
        }
        None => {
            headers.remove(X_FORWARDED_FOR);
        }
    }
    if let Ok(value) = HeaderValue::from_str(original_uri) {
        headers.insert(X_ORIGINAL_URI, value);
    }
    headers
}
