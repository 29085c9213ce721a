// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration validation
//!
//! This module checks that configuration values are within valid ranges and
//! parse into the addresses the logger will bind and send to.

use std::net::IpAddr;

use crate::{ConfigError, ConfigResult, LoggerConfig};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: &[&str] = &["text", "json"];

/// Validation errors that can occur during config validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValidationError {
    InvalidPort { field: String, port: u16 },
    MissingRequired { field: String },
    InvalidValue { field: String, reason: String },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidPort { field, port } => {
                write!(f, "Port {} = {} is outside valid range (1-65535)", field, port)
            }
            Self::MissingRequired { field } => {
                write!(f, "Missing required configuration: {}", field)
            }
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
        }
    }
}

/// Validate the complete configuration
///
/// Every problem is collected before returning, so one run reports them all.
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` with details if validation fails
pub fn validate_config(config: &LoggerConfig) -> ConfigResult<()> {
    let errors = collect_errors(config);

    if !errors.is_empty() {
        let error_messages = errors
            .iter()
            .map(|e| format!("  - {}", e))
            .collect::<Vec<_>>()
            .join("\n");

        return Err(ConfigError::ValidationError(format!(
            "Configuration validation failed:\n{}",
            error_messages
        )));
    }

    Ok(())
}

/// All validation problems found in `config`
pub fn collect_errors(config: &LoggerConfig) -> Vec<ConfigValidationError> {
    let mut errors = Vec::new();
    validate_listener(config, &mut errors);
    validate_visualizer(config, &mut errors);
    validate_boards(config, &mut errors);
    validate_logging(config, &mut errors);
    errors
}

fn validate_listener(config: &LoggerConfig, errors: &mut Vec<ConfigValidationError>) {
    let listener = &config.listener;

    if listener.udp_port == Some(0) {
        errors.push(ConfigValidationError::InvalidPort {
            field: "listener.udp_port".to_string(),
            port: 0,
        });
    }
    if listener.uds_path.as_os_str().is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "listener.uds_path".to_string(),
        });
    }
    if listener.udp_bind_host.parse::<IpAddr>().is_err() {
        errors.push(ConfigValidationError::InvalidValue {
            field: "listener.udp_bind_host".to_string(),
            reason: format!("'{}' is not an IP address", listener.udp_bind_host),
        });
    }
    if !(1..=65535).contains(&listener.max_datagram_size) {
        errors.push(ConfigValidationError::InvalidValue {
            field: "listener.max_datagram_size".to_string(),
            reason: format!("{} is outside 1-65535", listener.max_datagram_size),
        });
    }
}

fn validate_visualizer(config: &LoggerConfig, errors: &mut Vec<ConfigValidationError>) {
    let visualizer = &config.visualizer;

    if visualizer.port == 0 {
        errors.push(ConfigValidationError::InvalidPort {
            field: "visualizer.port".to_string(),
            port: 0,
        });
    }
    if visualizer.address.trim().is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "visualizer.address".to_string(),
        });
    }
}

fn validate_boards(config: &LoggerConfig, errors: &mut Vec<ConfigValidationError>) {
    for (name, address) in ["a", "b", "c"].iter().zip(&config.boards.addresses) {
        if address.parse::<IpAddr>().is_err() {
            errors.push(ConfigValidationError::InvalidValue {
                field: format!("boards.addresses[{}]", name),
                reason: format!("'{}' is not an IP address", address),
            });
        }
    }
}

fn validate_logging(config: &LoggerConfig, errors: &mut Vec<ConfigValidationError>) {
    let logging = &config.logging;

    if !LOG_LEVELS.contains(&logging.level.to_lowercase().as_str()) {
        errors.push(ConfigValidationError::InvalidValue {
            field: "logging.level".to_string(),
            reason: format!("expected one of {}", LOG_LEVELS.join(", ")),
        });
    }
    if !LOG_FORMATS.contains(&logging.format.to_lowercase().as_str()) {
        errors.push(ConfigValidationError::InvalidValue {
            field: "logging.format".to_string(),
            reason: format!("expected one of {}", LOG_FORMATS.join(", ")),
        });
    }
}
