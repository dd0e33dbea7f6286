//! Service descriptor and derived status.
//!
//! # Responsibilities
//! - Represent a single registered backend service
//! - Track last liveness verdict, probe timestamp and latency
//! - Derive [`ServiceStatus`] from the stored flag plus staleness

use serde::Serialize;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Derived service status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Healthy,
    Unhealthy,
    Unknown,
}

impl ServiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceStatus::Healthy => "healthy",
            ServiceStatus::Unhealthy => "unhealthy",
            ServiceStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered backend service.
///
/// Values handed out by the registry are snapshots; they are not updated
/// when the registry changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    name: String,
    /// Origin used to build forwarded requests, without trailing slash.
    pub base_url: String,
    /// Path appended to `base_url` for liveness probes.
    pub health_path: String,
    /// Last liveness verdict.
    pub is_healthy: bool,
    /// When the last probe completed. `None` until the first probe.
    pub last_checked: Option<SystemTime>,
    /// Duration of the most recent probe.
    pub last_response_time: Duration,
    /// Probe outcomes.
    pub success_count: u64,
    pub error_count: u64,
    /// Forwarded-call outcomes, kept apart from probe counters.
    pub requests_ok: u64,
    pub requests_failed: u64,
}

impl ServiceDescriptor {
    /// Create a descriptor that has not been probed yet.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        health_path: impl Into<String>,
    ) -> Self {
        let base_url: String = base_url.into();
        Self {
            name: name.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            health_path: health_path.into(),
            is_healthy: false,
            last_checked: None,
            last_response_time: Duration::ZERO,
            success_count: 0,
            error_count: 0,
            requests_ok: 0,
            requests_failed: 0,
        }
    }

    /// Registry key. Immutable once constructed.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Full liveness probe URL.
    pub fn health_url(&self) -> String {
        format!("{}{}", self.base_url, self.health_path)
    }

    /// Derive the current status.
    ///
    /// A healthy verdict older than `staleness` degrades to `Unknown`, as does
    /// a service that has never been probed.
    pub fn status(&self, staleness: Duration) -> ServiceStatus {
        self.status_at(SystemTime::now(), staleness)
    }

    pub(crate) fn status_at(&self, now: SystemTime, staleness: Duration) -> ServiceStatus {
        let Some(checked) = self.last_checked else {
            return ServiceStatus::Unknown;
        };
        if !self.is_healthy {
            return ServiceStatus::Unhealthy;
        }
        let age = now.duration_since(checked).unwrap_or(Duration::ZERO);
        if age > staleness {
            ServiceStatus::Unknown
        } else {
            ServiceStatus::Healthy
        }
    }

    /// `last_checked` as unix seconds, for display.
    pub fn last_checked_unix(&self) -> Option<u64> {
        self.last_checked
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
    }
}
