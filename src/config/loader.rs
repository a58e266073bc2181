//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::HttpdConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<HttpdConfig, ConfigError> {
    let config: HttpdConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<HttpdConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.listener.bind_address, ":8080");
        assert_eq!(config.server.identity(), Some("GMOryx/0.1"));
        assert!(!config.observability.metrics_enabled);
    }

    #[test]
    fn sections_override_defaults() {
        let config = parse_config(
            r#"
            [listener]
            bind_address = "127.0.0.1:9000"

            [server]
            identity = "Custom/1.0"
            drain_timeout_ms = 250
            "#,
        )
        .unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:9000");
        assert_eq!(config.server.identity(), Some("Custom/1.0"));
        assert_eq!(config.server.drain_timeout_ms, 250);
        assert_eq!(config.server.request_timeout_secs, 30);
    }

    #[test]
    fn parse_and_validation_errors() {
        assert!(matches!(parse_config("[listener"), Err(ConfigError::Parse(_))));

        let err = parse_config("[server]\nworker_threads = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref v) if v.len() == 1));
        assert!(err.to_string().contains("server.worker_threads"));
    }
}
