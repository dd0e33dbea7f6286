//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validated config → Build registry and core → Bind listeners → Serve
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop ticking and accepting → Drain (grace period) → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then core, then listeners
//! - One root signal; every background loop subscribes to it
//! - Shutdown has timeout: in-flight requests are aborted after the deadline

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
pub use startup::{launch, StartupError};
