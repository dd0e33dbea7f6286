//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request ID assigned or kept)
//!     → identity + rate limit (security)
//!     → routing (service from first path segment)
//!     → proxy forwarder (registry, retries, transport)
//!     → response.rs (error mapping, rate-limit headers)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{MakeRequestUuid, X_REQUEST_ID};
pub use response::ErrorResponse;
pub use server::{AppState, HttpServer};
