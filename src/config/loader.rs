//! Configuration loading from disk.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::GateConfig;
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
pub fn parse_config(content: &str) -> Result<GateConfig, ConfigError> {
    let config: GateConfig = toml::from_str(content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GateConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::LockoutScope;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = parse_config(
            r#"
            [throttle]
            max_attempts = 3
            lockout_scope = "auth_only"

            [rate_limit]
            window_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.throttle.max_attempts, 3);
        assert_eq!(config.throttle.lockout_secs, 900);
        assert_eq!(config.throttle.lockout_scope, LockoutScope::AuthOnly);
        assert_eq!(config.rate_limit.window_ms, 250);
        assert!(config.rate_limit.enabled);
        assert_eq!(config.inspector.max_body_bytes, 2 * 1024 * 1024);
    }

    #[test]
    fn test_invalid_values_are_reported() {
        let err = parse_config("[inspector]\nmax_body_bytes = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("inspector.max_body_bytes"));
    }

    #[test]
    fn test_syntax_error() {
        let err = parse_config("[throttle\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
