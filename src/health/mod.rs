//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer
//!     → Spawn one probe per registered service
//!     → GET base_url + health_path (bounded timeout)
//!     → registry.update_health (always, success or failure)
//! ```
//!
//! # Design Decisions
//! - One probe flips the verdict; there is no consecutive-failure threshold
//! - Staleness is applied at read time by the registry, not here
//! - Probing is fully decoupled from the request path

pub mod active;

pub use active::HealthMonitor;
