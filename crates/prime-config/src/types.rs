// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! This module defines all configuration structs that map to sections in
//! `prime_logger.toml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub listener: ListenerConfig,
    pub visualizer: VisualizerConfig,
    pub boards: BoardsConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

/// Socket the logger receives on
///
/// When `udp_port` is set the logger runs in remote mode and listens on UDP;
/// otherwise it binds a local datagram socket at `uds_path`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    pub uds_path: PathBuf,
    pub udp_port: Option<u16>,
    pub udp_bind_host: String,
    pub max_datagram_size: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            uds_path: PathBuf::from("/tmp/logger.uds"),
            udp_port: None,
            udp_bind_host: "0.0.0.0".to_string(),
            max_datagram_size: 65535,
        }
    }
}

impl ListenerConfig {
    pub fn is_remote(&self) -> bool {
        self.udp_port.is_some()
    }

    /// `host:port` for remote mode
    pub fn udp_bind_address(&self) -> Option<String> {
        self.udp_port
            .map(|port| format!("{}:{}", self.udp_bind_host, port))
    }
}

/// Visualizer mirror
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct VisualizerConfig {
    pub enabled: bool,
    pub address: String,
    pub port: u16,
}

impl Default for VisualizerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            address: "127.0.0.1".to_string(),
            port: 9000,
        }
    }
}

impl VisualizerConfig {
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

/// Addresses of the demonstrator boards
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BoardsConfig {
    /// Boards a, b and c in order
    pub addresses: [String; 3],
}

impl Default for BoardsConfig {
    fn default() -> Self {
        Self {
            addresses: [
                "0.0.0.0".to_string(),
                "0.0.0.0".to_string(),
                "0.0.0.0".to_string(),
            ],
        }
    }
}

impl BoardsConfig {
    /// Board whose application registrations carry a `ur_id` (board c)
    pub fn attribution_board(&self) -> &str {
        &self.addresses[2]
    }
}

/// Record output
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Record file; standard output when unset
    pub path: Option<PathBuf>,
    /// Initial record-file type filter (empty = everything)
    pub file_filter: Vec<String>,
    /// Initial visualizer type filter (empty = everything)
    pub visual_filter: Vec<String>,
}

/// Diagnostic logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// trace, debug, info, warn or error
    pub level: String,
    /// text or json
    pub format: String,
    /// Rolling log directory (file logging builds only)
    pub log_dir: Option<PathBuf>,
    /// Number of run directories to keep
    pub retention_runs: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
            log_dir: None,
            retention_runs: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LoggerConfig::default();
        assert_eq!(config.listener.uds_path, PathBuf::from("/tmp/logger.uds"));
        assert!(!config.listener.is_remote());
        assert!(!config.visualizer.enabled);
        assert_eq!(config.visualizer.endpoint(), "127.0.0.1:9000");
        assert_eq!(config.boards.attribution_board(), "0.0.0.0");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: LoggerConfig = toml::from_str(
            r#"
            [listener]
            udp_port = 5000

            [boards]
            addresses = ["10.0.0.1", "10.0.0.2", "10.0.0.3"]
            "#,
        )
        .unwrap();
        assert_eq!(
            config.listener.udp_bind_address().as_deref(),
            Some("0.0.0.0:5000")
        );
        assert_eq!(config.listener.max_datagram_size, 65535);
        assert_eq!(config.boards.attribution_board(), "10.0.0.3");
        assert_eq!(config.logging.level, "info");
    }
}
