//! Configuration loading from disk.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<GatewayConfig, ConfigError> {
    let config: GatewayConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_file() {
        let config = parse_config(
            r#"
            [listener]
            bind_address = "127.0.0.1:9999"

            [health_check]
            interval_secs = 5

            [rate_limit]
            requests_per_second = 5
            redis_url = "redis://127.0.0.1:6379"

            [[services]]
            name = "orders"
            base_url = "http://backend:9000"
            health_path = "/healthz"
            retry_count = 1
            "#,
        )
        .unwrap();

        assert_eq!(config.listener.bind_address, "127.0.0.1:9999");
        assert_eq!(config.health_check.interval_secs, 5);
        assert_eq!(config.services[0].retry_count, Some(1));
        assert_eq!(config.rate_limit.redis_url.as_deref(), Some("redis://127.0.0.1:6379"));
    }

    #[test]
    fn invalid_file_reports_validation() {
        let err = parse_config(
            r#"
            [[services]]
            name = ""
            base_url = "http://backend:9000"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("services[0].name"));
    }

    #[test]
    fn syntax_error_is_parse() {
        assert!(matches!(parse_config("[[services"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn bundled_sample_is_valid() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/gateway.toml");
        let config = load_config(&path).unwrap();
        assert_eq!(config.services.len(), 2);
        assert_eq!(config.services[1].timeout_secs, Some(10));
    }

    #[test]
    fn missing_file_is_io() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
