//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Forwarded call:
//!     → transport deadline (per attempt)
//!     → On transport failure: retries.rs (attempt bound)
//!     → backoff.rs (linear wait before the next attempt)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Known-unhealthy services fail fast before any attempt
//! - Retry budget is per call, not global

pub mod backoff;
pub mod retries;

pub use retries::RetryPolicy;
