//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path)
//!     → matcher.rs (strip route prefix)
//!     → router.rs (first segment = service, rest = backend path)
//!     → Return: RouteTarget or no match
//! ```
//!
//! # Design Decisions
//! - The route table is the registry itself; there is no separate route config
//! - Query strings are never touched here; the handler forwards them verbatim
//! - Deterministic: same input always resolves to the same target

pub mod matcher;
pub mod router;

pub use router::{resolve, RouteTarget, Router};
