// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! This module implements the 3-tier configuration loading system:
//! 1. TOML file (base defaults)
//! 2. Environment variables (runtime overrides)
//! 3. CLI arguments (explicit user overrides)

use crate::{ConfigError, ConfigResult, LoggerConfig};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Default configuration file name
pub const CONFIG_FILE_NAME: &str = "prime_logger.toml";

/// Environment variable naming an explicit configuration file
pub const CONFIG_PATH_ENV: &str = "PRIME_LOGGER_CONFIG_PATH";

/// Find the logger configuration file
///
/// Search order:
/// 1. `PRIME_LOGGER_CONFIG_PATH` environment variable
/// 2. Current working directory: `./prime_logger.toml`
/// 3. Parent directories (up to 5 levels)
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if no config file is found in any location
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        } else {
            return Err(ConfigError::FileNotFound(format!(
                "Config file specified by {} not found: {}",
                CONFIG_PATH_ENV,
                path.display()
            )));
        }
    }

    let mut search_paths = Vec::new();
    if let Ok(cwd) = env::current_dir() {
        search_paths.push(cwd.join(CONFIG_FILE_NAME));

        let mut current = cwd.clone();
        for _ in 0..5 {
            if let Some(parent) = current.parent() {
                search_paths.push(parent.join(CONFIG_FILE_NAME));
                current = parent.to_path_buf();
            }
        }
    }

    for path in &search_paths {
        if path.exists() {
            return Ok(path.clone());
        }
    }

    let search_list = search_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::FileNotFound(format!(
        "'{}' not found in any of these locations:\n{}\n\nSet {} to specify a custom location.",
        CONFIG_FILE_NAME, search_list, CONFIG_PATH_ENV
    )))
}

/// Load configuration
///
/// # Arguments
///
/// * `config_path` - Explicit config file. If `None`, the file is searched for and
///   built-in defaults are used when none exists.
/// * `cli_args` - Optional CLI argument overrides
///
/// # Errors
///
/// Returns an error if an explicit file (argument or `PRIME_LOGGER_CONFIG_PATH`)
/// is missing, or if the file is not valid TOML.
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<LoggerConfig> {
    let config_file = match config_path {
        Some(path) => Some(path.to_path_buf()),
        None => match find_config_file() {
            Ok(path) => Some(path),
            Err(ConfigError::FileNotFound(_)) if env::var_os(CONFIG_PATH_ENV).is_none() => None,
            Err(e) => return Err(e),
        },
    };

    let mut config = match config_file {
        Some(path) => {
            let content = fs::read_to_string(&path)?;
            toml::from_str(&content)?
        }
        None => LoggerConfig::default(),
    };

    apply_environment_overrides(&mut config);

    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli);
    }

    Ok(config)
}

/// Apply environment variable overrides to configuration
///
/// Supported environment variables:
/// - `PRIME_LOGGER_PORT` -> `listener.udp_port`
/// - `PRIME_LOGGER_UDS_PATH` -> `listener.uds_path`
/// - `PRIME_LOGGER_VISUALIZER_ADDR` -> `visualizer.address` (enables the visualizer)
/// - `PRIME_LOGGER_VISUALIZER_PORT` -> `visualizer.port` (enables the visualizer)
/// - `PRIME_LOGGER_LOG_LEVEL` -> `logging.level`
/// - `PRIME_LOGGER_BOARD_A` / `_B` / `_C` -> `boards.addresses`
pub fn apply_environment_overrides(config: &mut LoggerConfig) {
    if let Ok(value) = env::var("PRIME_LOGGER_PORT") {
        if let Ok(port) = value.parse::<u16>() {
            config.listener.udp_port = Some(port);
        }
    }
    if let Ok(value) = env::var("PRIME_LOGGER_UDS_PATH") {
        config.listener.uds_path = PathBuf::from(value);
    }

    if let Ok(value) = env::var("PRIME_LOGGER_VISUALIZER_ADDR") {
        config.visualizer.address = value;
        config.visualizer.enabled = true;
    }
    if let Ok(value) = env::var("PRIME_LOGGER_VISUALIZER_PORT") {
        if let Ok(port) = value.parse::<u16>() {
            config.visualizer.port = port;
            config.visualizer.enabled = true;
        }
    }

    if let Ok(value) = env::var("PRIME_LOGGER_LOG_LEVEL") {
        config.logging.level = value;
    }

    for (index, var) in ["PRIME_LOGGER_BOARD_A", "PRIME_LOGGER_BOARD_B", "PRIME_LOGGER_BOARD_C"]
        .iter()
        .enumerate()
    {
        if let Ok(value) = env::var(var) {
            config.boards.addresses[index] = value;
        }
    }
}

/// Apply CLI argument overrides to configuration
///
/// # Arguments
///
/// * `config` - Configuration to modify
/// * `cli_args` - HashMap of CLI arguments (e.g., `{"port": "5000", "boardc": "10.0.0.3"}`)
///
/// Recognised keys: `port`, `uds_path`, `visualiser`, `visualiser_addr`,
/// `visualiser_port`, `boarda`, `boardb`, `boardc`, `output`, `log_level`.
pub fn apply_cli_overrides(config: &mut LoggerConfig, cli_args: &HashMap<String, String>) {
    if let Some(value) = cli_args.get("port") {
        if let Ok(port) = value.parse::<u16>() {
            config.listener.udp_port = Some(port);
        }
    }
    if let Some(value) = cli_args.get("uds_path") {
        config.listener.uds_path = PathBuf::from(value);
    }

    if let Some(value) = cli_args.get("visualiser") {
        config.visualizer.enabled = value.to_lowercase() == "true" || value == "1";
    }
    if let Some(value) = cli_args.get("visualiser_addr") {
        config.visualizer.address = value.clone();
        config.visualizer.enabled = true;
    }
    if let Some(value) = cli_args.get("visualiser_port") {
        if let Ok(port) = value.parse::<u16>() {
            config.visualizer.port = port;
            config.visualizer.enabled = true;
        }
    }

    for (index, key) in ["boarda", "boardb", "boardc"].iter().enumerate() {
        if let Some(value) = cli_args.get(*key) {
            config.boards.addresses[index] = value.clone();
        }
    }

    if let Some(value) = cli_args.get("output") {
        config.output.path = Some(PathBuf::from(value));
    }
    if let Some(value) = cli_args.get("log_level") {
        config.logging.level = value.clone();
    }
}
