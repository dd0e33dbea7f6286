//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Forwarder, health monitor, rate limiter produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape of /metrics)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows through logs and to backends
//! - Metrics sink is an explicit component, not a global

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use metrics::GatewayMetrics;
