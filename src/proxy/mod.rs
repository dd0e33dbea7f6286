//! Proxy subsystem.
//!
//! # Data Flow
//! ```text
//! ForwardRequest
//!     → forwarder.rs (registry lookup, health gate, header rewrite)
//!     → retry loop (resilience)
//!     → transport.rs (pooled hyper client, per-host cap, deadline)
//!     → ProxyResponse or GatewayError
//! ```

pub mod forwarder;
pub mod transport;

pub use forwarder::{ForwardRequest, ProxyForwarder, ProxyResponse};
pub use transport::{HyperTransport, OutboundRequest, Transport, TransportError, TransportResponse};
