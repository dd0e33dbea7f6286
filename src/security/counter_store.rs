//! Shared counter stores for fixed-window rate limiting.
//!
//! # Responsibilities
//! - Atomic increment-with-expiry, the only primitive the limiter needs
//! - Redis backend for multi-instance deployments
//! - In-process backend for single instances and tests
//!
//! # Design Decisions
//! - Expiry is set only when the increment created the key, so the window
//!   is anchored at the first request
//! - On Redis the increment and expiry run as one script; a dropped call can
//!   never leave a counter without a TTL
//! - Every Redis round trip is bounded; an unreachable store must degrade
//!   quickly so the limiter can fail open
//! - The Redis connection is established lazily and re-attempted on the next
//!   call if it fails

use async_trait::async_trait;
use dashmap::DashMap;
use redis::aio::ConnectionManager;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{watch, OnceCell};
use tokio::time::{self, Instant};

/// Counter store failures. The limiter treats all of them alike.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("counter store timed out after {0:?}")]
    Timeout(Duration),
}

/// Atomic counter with time-to-live.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increment `key` and return the post-increment value. If the key was
    /// created by this call it expires after `ttl`.
    async fn incr_with_expiry(&self, key: &str, ttl: Duration) -> Result<u64, StoreError>;
}

// A key found without a TTL gets one too, so counters left by an
// interrupted writer still clear.
const INCR_WITH_EXPIRY: &str = r"
local count = redis.call('INCR', KEYS[1])
if count == 1 or redis.call('TTL', KEYS[1]) == -1 then
    redis.call('EXPIRE', KEYS[1], ARGV[1])
end
return count
";

/// Redis-backed counters (`INCR` + `EXPIRE` in one Lua script).
pub struct RedisCounterStore {
    client: redis::Client,
    conn: OnceCell<ConnectionManager>,
    script: redis::Script,
    timeout: Duration,
}

impl RedisCounterStore {
    /// Parse `url` without connecting.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, StoreError> {
        Ok(Self {
            client: redis::Client::open(url)?,
            conn: OnceCell::new(),
            script: redis::Script::new(INCR_WITH_EXPIRY),
            timeout,
        })
    }

    async fn incr_inner(&self, key: &str, ttl: Duration) -> Result<u64, StoreError> {
        let conn = self
            .conn
            .get_or_try_init(|| ConnectionManager::new(self.client.clone()))
            .await?;
        let mut conn = conn.clone();

        let count: u64 = self
            .script
            .key(key)
            .arg(ttl.as_secs().max(1))
            .invoke_async(&mut conn)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn incr_with_expiry(&self, key: &str, ttl: Duration) -> Result<u64, StoreError> {
        time::timeout(self.timeout, self.incr_inner(key, ttl))
            .await
            .map_err(|_| StoreError::Timeout(self.timeout))?
    }
}

/// In-process counters.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    counters: DashMap<String, (u64, Instant)>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop expired counters, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.counters.len();
        self.counters.retain(|_, (_, expires_at)| *expires_at > now);
        before.saturating_sub(self.counters.len())
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Purge expired counters every `interval` until `shutdown` fires.
    pub async fn run_sweeper(self: Arc<Self>, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = time::interval(interval);
        loop {
            tokio::select! {
                _ = shutdown.wait_for(|stop| *stop) => {
                    tracing::debug!("Counter sweeper stopping");
                    break;
                }
                _ = ticker.tick() => {
                    let removed = self.purge_expired();
                    if removed > 0 {
                        tracing::trace!(removed, "Expired rate limit counters purged");
                    }
                }
            }
        }
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn incr_with_expiry(&self, key: &str, ttl: Duration) -> Result<u64, StoreError> {
        let now = Instant::now();
        let mut entry = self
            .counters
            .entry(key.to_string())
            .or_insert((0, now + ttl));
        if entry.1 <= now {
            *entry = (0, now + ttl);
        }
        entry.0 += 1;
        Ok(entry.0)
    }
}
