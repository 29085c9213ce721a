// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! CLI argument parsing for per-crate debug flags
//!
//! Supports flags like `--debug-prime-protocol`, `--debug-prime-io`, etc.
//! to raise the log level of individual crates.

use std::collections::HashMap;
use std::env;

use crate::KNOWN_CRATES;

/// Environment variable listing crates to debug ("all" or comma-separated names)
pub const DEBUG_ENV: &str = "PRIME_DEBUG";

/// Parse debug flags from command-line arguments
///
/// # Example
/// ```rust
/// use prime_observability::CrateDebugFlags;
///
/// let flags = CrateDebugFlags::from_args(vec!["--debug-prime-io".to_string()]);
/// assert!(flags.is_enabled("prime-io"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct CrateDebugFlags {
    pub enabled_crates: HashMap<String, bool>,
}

impl CrateDebugFlags {
    /// Parse debug flags from command-line arguments
    ///
    /// Looks for arguments matching `--debug-{crate-name}` pattern.
    /// Also supports `--debug-all` to enable all crates.
    pub fn from_args<I>(args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut flags = CrateDebugFlags::default();

        for arg in args {
            if arg == "--debug-all" {
                flags.enable_all();
                continue;
            }

            if let Some(crate_name) = arg.strip_prefix("--debug-") {
                flags.enable(crate_name);
            }
        }

        flags
    }

    /// Merge a `PRIME_DEBUG`-style value into the flags
    pub fn merge_env_value(&mut self, value: &str) {
        if value.trim() == "all" {
            self.enable_all();
            return;
        }
        for crate_name in value.split(',') {
            let crate_name = crate_name.trim();
            if !crate_name.is_empty() {
                self.enable(crate_name);
            }
        }
    }

    fn enable(&mut self, crate_name: &str) {
        self.enabled_crates.insert(crate_name.to_string(), true);
    }

    fn enable_all(&mut self) {
        for crate_name in KNOWN_CRATES {
            self.enable(crate_name);
        }
    }

    /// Check if debug is enabled for a specific crate
    pub fn is_enabled(&self, crate_name: &str) -> bool {
        self.enabled_crates.contains_key(crate_name)
    }

    /// Get all enabled crates
    pub fn enabled_crates(&self) -> Vec<&String> {
        self.enabled_crates.keys().collect()
    }

    /// Check if debug is enabled for any crate
    pub fn any_enabled(&self) -> bool {
        !self.enabled_crates.is_empty()
    }

    /// Get log level filter for a crate
    ///
    /// Returns `tracing::Level::DEBUG` if enabled, `tracing::Level::INFO` otherwise.
    pub fn log_level(&self, crate_name: &str) -> tracing::Level {
        if self.is_enabled(crate_name) {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Create a tracing filter from debug flags with `info` as the default level
    pub fn to_filter_string(&self) -> String {
        self.to_filter_string_with_default("info")
    }

    /// Create a tracing filter from debug flags
    ///
    /// Returns a filter string usable with `EnvFilter`, e.g.
    /// "prime_io=debug,prime_protocol=debug,warn". Crate names are mapped to
    /// tracing targets (hyphens become underscores). Directives are sorted so
    /// the output is stable.
    pub fn to_filter_string_with_default(&self, default_level: &str) -> String {
        let mut filters: Vec<String> = self
            .enabled_crates
            .keys()
            .map(|crate_name| format!("{}=debug", crate_name.replace('-', "_")))
            .collect();
        filters.sort();
        filters.push(default_level.to_string());
        filters.join(",")
    }
}

/// Parse debug flags from the process arguments and `PRIME_DEBUG`
pub fn parse_debug_flags() -> CrateDebugFlags {
    let mut flags = CrateDebugFlags::from_args(env::args());

    if let Ok(env_var) = env::var(DEBUG_ENV) {
        flags.merge_env_value(&env_var);
    }

    flags
}

/// Generate help text for debug flags
pub fn debug_flags_help() -> String {
    format!(
        r#"Debug Flags:
  --debug-all                    Enable debug logging for all crates
  --debug-{{crate-name}}          Enable debug logging for specific crate

Available crates:
  {}

Environment Variable:
  PRIME_DEBUG={{crate-name}}[,{{crate-name}}]  Enable debug for crates (comma-separated)
  PRIME_DEBUG=all                               Enable debug for all crates

Examples:
  --debug-prime-protocol
  --debug-prime-protocol --debug-prime-io
  PRIME_DEBUG=prime-protocol,prime-io
"#,
        KNOWN_CRATES.join(", ")
    )
}
