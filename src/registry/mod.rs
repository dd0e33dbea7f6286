//! Service registry subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     ServiceConfig[] → store.rs (register, duplicate = fatal)
//!
//! Steady state:
//!     health monitor → update_health (exclusive write)
//!     forwarder      → get + descriptor.rs status() (shared read)
//!     admin API      → list_all / deregister
//! ```
//!
//! # Design Decisions
//! - The registry is the only in-process shared mutable structure
//! - Status is derived at read time, never stored
//! - Memory-resident; rebuilt from configuration on restart

pub mod descriptor;
pub mod store;

pub use descriptor::{ServiceDescriptor, ServiceStatus};
pub use store::ServiceRegistry;
