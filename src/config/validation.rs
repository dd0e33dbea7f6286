//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate service names, URLs and probe paths
//! - Validate value ranges (timeouts, intervals, budgets > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::{GatewayConfig, ADMIN_KEY_PLACEHOLDER};

/// Names served by the gateway itself at the root.
const RESERVED_NAMES: &[&str] = &["health", "metrics"];

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new("listener.bind_address", "not a socket address"));
    }

    let prefix = &config.proxy.route_prefix;
    if !prefix.starts_with('/') {
        errors.push(ValidationError::new("proxy.route_prefix", "must start with '/'"));
    }

    let mut seen = HashSet::new();
    for (i, service) in config.services.iter().enumerate() {
        let field = |name: &str| format!("services[{}].{}", i, name);

        if service.name.is_empty() {
            errors.push(ValidationError::new(field("name"), "must not be empty"));
        } else if !service
            .name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        {
            errors.push(ValidationError::new(
                field("name"),
                "only ASCII letters, digits, '-', '_' and '.' are allowed",
            ));
        }
        if !seen.insert(service.name.as_str()) {
            errors.push(ValidationError::new(
                field("name"),
                format!("duplicate service '{}'", service.name),
            ));
        }
        if prefix.trim_matches('/').is_empty() && RESERVED_NAMES.contains(&service.name.as_str()) {
            errors.push(ValidationError::new(
                field("name"),
                format!("'{}' is reserved when route_prefix is '/'", service.name),
            ));
        }

        match Url::parse(&service.base_url) {
            Ok(url) if url.scheme() == "http" && url.has_host() => {}
            Ok(_) => errors.push(ValidationError::new(field("base_url"), "must be an http:// URL")),
            Err(e) => errors.push(ValidationError::new(field("base_url"), e.to_string())),
        }

        if !service.health_path.starts_with('/') {
            errors.push(ValidationError::new(field("health_path"), "must start with '/'"));
        }
        if service.timeout_secs == Some(0) {
            errors.push(ValidationError::new(field("timeout_secs"), "must be > 0"));
        }
    }

    let hc = &config.health_check;
    if hc.enabled && hc.interval_secs == 0 {
        errors.push(ValidationError::new("health_check.interval_secs", "must be > 0"));
    }
    if hc.timeout_secs == 0 {
        errors.push(ValidationError::new("health_check.timeout_secs", "must be > 0"));
    }
    // A verdict must outlive the gap to the next one, or healthy services
    // read as unknown between ticks.
    if hc.enabled && hc.staleness_secs <= hc.interval_secs.saturating_add(hc.timeout_secs) {
        errors.push(ValidationError::new(
            "health_check.staleness_secs",
            "must exceed interval_secs + timeout_secs",
        ));
    }
    if hc.max_connections_per_host == 0 {
        errors.push(ValidationError::new("health_check.max_connections_per_host", "must be > 0"));
    }

    let proxy = &config.proxy;
    if proxy.timeout_secs == 0 {
        errors.push(ValidationError::new("proxy.timeout_secs", "must be > 0"));
    }
    if proxy.max_connections_per_host == 0 {
        errors.push(ValidationError::new("proxy.max_connections_per_host", "must be > 0"));
    }

    let rl = &config.rate_limit;
    if rl.enabled {
        if rl.requests_per_second == 0 {
            errors.push(ValidationError::new("rate_limit.requests_per_second", "must be > 0"));
        }
        if rl.window_secs == 0 {
            errors.push(ValidationError::new("rate_limit.window_secs", "must be > 0"));
        }
        if let Some(redis_url) = &rl.redis_url {
            if Url::parse(redis_url).is_err() {
                errors.push(ValidationError::new("rate_limit.redis_url", "not a valid URL"));
            }
        }
    }

    if config.admin.enabled {
        if config.admin.api_key.is_empty() || config.admin.api_key == ADMIN_KEY_PLACEHOLDER {
            errors.push(ValidationError::new("admin.api_key", "must be set when admin is enabled"));
        }
        if config.admin.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new("admin.bind_address", "not a socket address"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ServiceConfig;

    fn service(name: &str, base_url: &str) -> ServiceConfig {
        ServiceConfig {
            name: name.into(),
            base_url: base_url.into(),
            health_path: "/health".into(),
            timeout_secs: None,
            retry_count: None,
        }
    }

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_error() {
        let mut config = GatewayConfig::default();
        config.services.push(service("orders", "http://backend:9000"));
        config.services.push(service("orders", "not a url"));
        config.services.push(service("bad name", "ftp://x"));
        config.rate_limit.requests_per_second = 0;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"services[1].name"));
        assert!(fields.contains(&"services[1].base_url"));
        assert!(fields.contains(&"services[2].name"));
        assert!(fields.contains(&"services[2].base_url"));
        assert!(fields.contains(&"rate_limit.requests_per_second"));
    }

    #[test]
    fn reserved_names_only_at_root() {
        let mut config = GatewayConfig::default();
        config.services.push(service("metrics", "http://backend:9000"));
        assert!(validate_config(&config).is_err());

        config.proxy.route_prefix = "/api".into();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn staleness_must_outlast_a_tick() {
        let mut config = GatewayConfig::default();
        config.health_check.interval_secs = 30;
        config.health_check.timeout_secs = 5;

        for staleness in [0, 30, 35] {
            config.health_check.staleness_secs = staleness;
            let errors = validate_config(&config).unwrap_err();
            assert_eq!(errors[0].field, "health_check.staleness_secs");
        }

        config.health_check.staleness_secs = 36;
        assert!(validate_config(&config).is_ok());

        config.health_check.staleness_secs = 0;
        config.health_check.enabled = false;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn admin_requires_real_key() {
        let mut config = GatewayConfig::default();
        config.admin.enabled = true;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "admin.api_key");

        config.admin.api_key = "s3cret".into();
        assert!(validate_config(&config).is_ok());
    }
}
