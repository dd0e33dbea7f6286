//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → identity.rs (user header → AuthenticatedUser)
//!     → rate_limit.rs (fixed-window admission, counter_store.rs)
//!     → Pass to routing and forwarding
//!     → headers.rs (strip hop-by-hop, add X-Forwarded-For / X-Original-URI)
//! ```
//!
//! # Design Decisions
//! - Reject early: admission runs before any registry or network work
//! - Availability over strictness when the counter store is down
//! - No trust in client-supplied forwarding headers

pub mod counter_store;
pub mod headers;
pub mod identity;
pub mod rate_limit;

pub use counter_store::{CounterStore, MemoryCounterStore, RedisCounterStore};
pub use identity::{AuthenticatedUser, ClientIdentity};
pub use rate_limit::{Admission, RateLimiter};
