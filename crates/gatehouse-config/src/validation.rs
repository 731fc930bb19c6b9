// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as valid addresses, non-zero limits, and well-formed
//! tool server URLs.

use crate::diagnostic::ConfigError;
use crate::model::GatehouseConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)`
/// with all collected validation errors (does not fail fast).
pub fn validate_config(config: &GatehouseConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let addr = config.server.bind_address.trim();
    if addr.is_empty() {
        errors.push(ConfigError::Validation {
            message: "server.bind_address must not be empty".to_string(),
        });
    } else {
        let is_valid_ip = addr.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = addr
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(ConfigError::Validation {
                message: format!(
                    "server.bind_address `{addr}` is not a valid IP address or hostname"
                ),
            });
        }
    }

    if config.store.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "store.database_path must not be empty".to_string(),
        });
    }

    if config.store.violation_queue_depth == 0 {
        errors.push(ConfigError::Validation {
            message: "store.violation_queue_depth must be at least 1".to_string(),
        });
    }

    for (scope, value) in [
        ("limits.burst", config.limits.burst),
        ("limits.per_chat", config.limits.per_chat),
        ("limits.hourly", config.limits.hourly),
        ("limits.daily", config.limits.daily),
    ] {
        if value == 0 {
            errors.push(ConfigError::Validation {
                message: format!("{scope} must be at least 1 (use the whitelist to exempt users)"),
            });
        }
    }

    if config.generation.max_iterations == 0 {
        errors.push(ConfigError::Validation {
            message: "generation.max_iterations must be at least 1".to_string(),
        });
    }

    if config.generation.total_timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "generation.total_timeout_secs must be at least 1".to_string(),
        });
    }

    if config.tools.timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "tools.timeout_secs must be at least 1".to_string(),
        });
    }

    for (name, url) in &config.tools.servers {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            errors.push(ConfigError::Validation {
                message: format!(
                    "tools.servers.{name} `{url}` must be an http:// or https:// URL"
                ),
            });
        }
    }

    if let Some(token) = &config.server.admin_token
        && token.trim().is_empty()
    {
        errors.push(ConfigError::Validation {
            message: "server.admin_token must not be empty when set (omit it to disable admin routes)"
                .to_string(),
        });
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

    #[test]
    fn default_config_validates() {
        let config = GatehouseConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn empty_database_path_fails_validation() {
        let mut config = GatehouseConfig::default();
        config.store.database_path = "".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("database_path"))));
    }

    #[test]
    fn zero_limit_fails_validation() {
        let mut config = GatehouseConfig::default();
        config.limits.burst = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("limits.burst"))));
    }

    #[test]
    fn bad_tool_server_url_fails_validation() {
        let mut config = GatehouseConfig::default();
        config
            .tools
            .servers
            .insert("visualization".to_string(), "ftp://nope".to_string());
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("visualization"))));
    }

    #[test]
    fn empty_admin_token_fails_validation() {
        let mut config = GatehouseConfig::default();
        config.server.admin_token = Some("  ".to_string());
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("admin_token"))));
    }

    #[test]
    fn valid_custom_config_passes() {
        let mut config = GatehouseConfig::default();
        config.server.bind_address = "0.0.0.0".to_string();
        config.store.database_path = "/tmp/test.db".to_string();
        config.server.admin_token = Some("secret".to_string());
        assert!(validate_config(&config).is_ok());
    }
}
