//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and URLs
//! - Validate value ranges (windows, thresholds, capacities > 0)
//! - Detect combinations that cannot work (store verifier without a store)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GateConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::{GateConfig, StoreBackend, VerifierKind};

/// Upper bound for every interval and timeout setting (one year).
pub const MAX_DURATION_SECS: u64 = 365 * 24 * 60 * 60;

/// Upper bound for `eviction.idle_multiplier`.
pub const MAX_IDLE_MULTIPLIER: u32 = 1000;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field}: must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field}: must not exceed {max}")]
    TooLarge { field: &'static str, max: u64 },

    #[error("{field}: must not be empty")]
    Empty { field: &'static str },

    #[error("{field}: invalid URL '{value}'")]
    InvalidUrl { field: &'static str, value: String },

    #[error("{field}: '{value}' must start with '/'")]
    InvalidPath { field: &'static str, value: String },

    #[error("auth.verifier = \"store\" requires store.backend = \"rest\"")]
    VerifierWithoutStore,
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GateConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    check_address(&mut errors, "upstream.address", &config.upstream.address);

    check_secs(&mut errors, "timeouts.request_secs", config.timeouts.request_secs);
    check_secs(
        &mut errors,
        "blacklist.refresh_interval_secs",
        config.blacklist.refresh_interval_secs,
    );
    check_secs(
        &mut errors,
        "blacklist.refresh_timeout_secs",
        config.blacklist.refresh_timeout_secs,
    );

    if config.throttle.max_attempts == 0 {
        errors.push(ValidationError::Zero { field: "throttle.max_attempts" });
    }
    check_secs(&mut errors, "throttle.lockout_secs", config.throttle.lockout_secs);

    if config.rate_limit.enabled {
        if config.rate_limit.window_ms == 0 {
            errors.push(ValidationError::Zero { field: "rate_limit.window_ms" });
        } else if config.rate_limit.window_ms > MAX_DURATION_SECS * 1000 {
            errors.push(ValidationError::TooLarge {
                field: "rate_limit.window_ms",
                max: MAX_DURATION_SECS * 1000,
            });
        }
    }

    if config.inspector.max_body_bytes == 0 {
        errors.push(ValidationError::Zero { field: "inspector.max_body_bytes" });
    }
    if config.inspector.patterns.iter().any(|p| p.is_empty()) {
        errors.push(ValidationError::Empty { field: "inspector.patterns[]" });
    }

    for path in &config.auth.basic_auth_paths {
        check_path(&mut errors, "auth.basic_auth_paths[]", path);
    }
    check_path(&mut errors, "auth.login_path", &config.auth.login_path);
    match config.auth.verifier {
        VerifierKind::Static => {
            if config.auth.username.is_empty() {
                errors.push(ValidationError::Empty { field: "auth.username" });
            }
            if config.auth.password.is_empty() {
                errors.push(ValidationError::Empty { field: "auth.password" });
            }
        }
        VerifierKind::Store => {
            if config.store.backend != StoreBackend::Rest {
                errors.push(ValidationError::VerifierWithoutStore);
            }
        }
    }

    if config.audit.queue_capacity == 0 {
        errors.push(ValidationError::Zero { field: "audit.queue_capacity" });
    }

    if config.eviction.enabled {
        check_secs(
            &mut errors,
            "eviction.sweep_interval_secs",
            config.eviction.sweep_interval_secs,
        );
        if config.eviction.idle_multiplier == 0 {
            errors.push(ValidationError::Zero { field: "eviction.idle_multiplier" });
        } else if config.eviction.idle_multiplier > MAX_IDLE_MULTIPLIER {
            errors.push(ValidationError::TooLarge {
                field: "eviction.idle_multiplier",
                max: u64::from(MAX_IDLE_MULTIPLIER),
            });
        }
    }

    if config.store.backend == StoreBackend::Rest {
        if url::Url::parse(&config.store.url).is_err() {
            errors.push(ValidationError::InvalidUrl {
                field: "store.url",
                value: config.store.url.clone(),
            });
        }
        if config.store.api_key.is_empty() {
            errors.push(ValidationError::Empty { field: "store.api_key" });
        }
        check_secs(&mut errors, "store.timeout_secs", config.store.timeout_secs);
    }

    if config.admin.enabled {
        check_address(&mut errors, "admin.bind_address", &config.admin.bind_address);
        if config.admin.api_key.is_empty() {
            errors.push(ValidationError::Empty { field: "admin.api_key" });
        }
    }

    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

fn check_secs(errors: &mut Vec<ValidationError>, field: &'static str, value: u64) {
    if value == 0 {
        errors.push(ValidationError::Zero { field });
    } else if value > MAX_DURATION_SECS {
        errors.push(ValidationError::TooLarge {
            field,
            max: MAX_DURATION_SECS,
        });
    }
}

fn check_path(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if !value.starts_with('/') {
        errors.push(ValidationError::InvalidPath {
            field,
            value: value.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&GateConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = GateConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.throttle.max_attempts = 0;
        config.audit.queue_capacity = 0;
        config.auth.login_path = "login".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::Zero { field: "throttle.max_attempts" }));
    }

    #[test]
    fn test_store_verifier_needs_rest_backend() {
        let mut config = GateConfig::default();
        config.auth.verifier = VerifierKind::Store;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::VerifierWithoutStore]);
    }

    #[test]
    fn test_rest_store_requires_url_and_key() {
        let mut config = GateConfig::default();
        config.store.backend = StoreBackend::Rest;
        config.store.url = "::nope".into();

        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(errors[0], ValidationError::InvalidUrl { .. }));
        assert_eq!(errors[1], ValidationError::Empty { field: "store.api_key" });
    }

    #[test]
    fn test_rejects_intervals_too_large_to_schedule() {
        let mut config = GateConfig::default();
        config.blacklist.refresh_interval_secs = u64::MAX;
        config.throttle.lockout_secs = MAX_DURATION_SECS;
        config.eviction.enabled = true;
        config.eviction.idle_multiplier = u32::MAX;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::TooLarge {
                    field: "blacklist.refresh_interval_secs",
                    max: MAX_DURATION_SECS,
                },
                ValidationError::TooLarge {
                    field: "eviction.idle_multiplier",
                    max: u64::from(MAX_IDLE_MULTIPLIER),
                },
            ]
        );
    }
}
