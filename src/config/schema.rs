//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Backend services registered at startup.
    pub services: Vec<ServiceConfig>,

    /// Health check settings.
    pub health_check: HealthCheckConfig,

    /// Forwarding, retry and outbound pool settings.
    pub proxy: ProxyConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Client identity extraction.
    pub identity: IdentityConfig,

    /// Graceful shutdown settings.
    pub shutdown: ShutdownConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

impl GatewayConfig {
    /// Timeout and retry policy for a service, falling back to proxy defaults.
    pub fn call_policy(&self, service: &ServiceConfig) -> CallPolicy {
        CallPolicy {
            timeout: Duration::from_secs(service.timeout_secs.unwrap_or(self.proxy.timeout_secs)),
            max_retries: service.retry_count.unwrap_or(self.proxy.retry_count),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// A backend service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Unique service name; first path segment of inbound requests.
    pub name: String,

    /// Origin for forwarded requests (e.g., "http://orders:9000").
    pub base_url: String,

    /// Liveness probe path appended to `base_url`.
    #[serde(default = "default_health_path")]
    pub health_path: String,

    /// Per-attempt timeout override in seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Retry count override.
    #[serde(default)]
    pub retry_count: Option<u32>,
}

fn default_health_path() -> String {
    "/health".to_string()
}

/// Effective per-service call policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallPolicy {
    pub timeout: Duration,
    pub max_retries: u32,
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable active health checks.
    pub enabled: bool,

    /// Health check interval in seconds.
    pub interval_secs: u64,

    /// Health check timeout in seconds.
    pub timeout_secs: u64,

    /// Age after which a healthy verdict degrades to unknown.
    pub staleness_secs: u64,

    /// Idle pooled connections kept per backend for probes.
    pub max_idle_per_host: usize,

    /// Concurrent probe connections per backend.
    pub max_connections_per_host: usize,
}

impl HealthCheckConfig {
    pub fn staleness(&self) -> Duration {
        Duration::from_secs(self.staleness_secs)
    }
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 30,
            timeout_secs: 5,
            staleness_secs: 300,
            max_idle_per_host: 10,
            max_connections_per_host: 10,
        }
    }
}

/// Forwarding configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Prefix under which `/{service}/...` is routed.
    pub route_prefix: String,

    /// Default per-attempt timeout in seconds.
    pub timeout_secs: u64,

    /// Default number of retries after the first attempt.
    pub retry_count: u32,

    /// Linear backoff step: retry `n` waits `n * backoff_step_ms`.
    pub backoff_step_ms: u64,

    /// Largest request body buffered for replay. Bounds memory per in-flight request.
    pub max_body_bytes: usize,

    /// Idle pooled connections kept per backend.
    pub max_idle_per_host: usize,

    /// Idle pooled connection lifetime in seconds.
    pub idle_timeout_secs: u64,

    /// Concurrent outbound connections per backend.
    pub max_connections_per_host: usize,
}

impl ProxyConfig {
    pub fn backoff_step(&self) -> Duration {
        Duration::from_millis(self.backoff_step_ms)
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            route_prefix: "/".to_string(),
            timeout_secs: 30,
            retry_count: 3,
            backoff_step_ms: 1000,
            max_body_bytes: 10 * 1024 * 1024,
            max_idle_per_host: 100,
            idle_timeout_secs: 90,
            max_connections_per_host: 100,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Requests admitted per client per window.
    pub requests_per_second: u32,

    /// Fixed window length in seconds.
    pub window_secs: u64,

    /// Shared counter store. In-process counters when absent.
    pub redis_url: Option<String>,

    /// Upper bound on one counter store round trip.
    pub store_timeout_ms: u64,
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_second: 100,
            window_secs: 1,
            redis_url: None,
            store_timeout_ms: 250,
        }
    }
}

/// Client identity configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct IdentityConfig {
    /// Header carrying an already-authenticated user id.
    pub user_header: Option<String>,
}

/// Graceful shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Time in-flight requests get after the shutdown signal.
    pub grace_period_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            grace_period_secs: 30,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Expose `/metrics`.
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
        }
    }
}

/// Placeholder admin key; refused by validation when the admin API is enabled.
pub const ADMIN_KEY_PLACEHOLDER: &str = "CHANGE_ME_IN_PRODUCTION";

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: ADMIN_KEY_PLACEHOLDER.to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_file_fills_defaults() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [[services]]
            name = "orders"
            base_url = "http://backend:9000"
            health_path = "/healthz"
            "#,
        )
        .unwrap();

        assert_eq!(config.services.len(), 1);
        assert_eq!(config.health_check.interval_secs, 30);
        assert_eq!(config.rate_limit.window_secs, 1);
        assert_eq!(config.proxy.route_prefix, "/");
        assert_eq!(config.observability.log_format, LogFormat::Pretty);
    }

    #[test]
    fn call_policy_falls_back_to_proxy_defaults() {
        let mut config = GatewayConfig::default();
        let mut svc = ServiceConfig {
            name: "orders".into(),
            base_url: "http://backend:9000".into(),
            health_path: default_health_path(),
            timeout_secs: None,
            retry_count: None,
        };
        config.proxy.timeout_secs = 7;
        config.proxy.retry_count = 2;
        assert_eq!(
            config.call_policy(&svc),
            CallPolicy { timeout: Duration::from_secs(7), max_retries: 2 }
        );

        svc.timeout_secs = Some(1);
        svc.retry_count = Some(0);
        assert_eq!(
            config.call_policy(&svc),
            CallPolicy { timeout: Duration::from_secs(1), max_retries: 0 }
        );
    }
}
