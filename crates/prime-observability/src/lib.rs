// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # prime-observability
//!
//! Logging infrastructure shared by the PRiME logger crates, with per-crate
//! debug flag support.
//!
//! Diagnostics go to stderr; standard output is left to the record sink.
//!
//! ## Features
//! - `file-logging`: Rolling JSON log files per run

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod config;
pub mod init;

pub use cli::*;
pub use config::*;
pub use init::*;

/// Workspace crate names accepted by `--debug-<crate>`
pub const KNOWN_CRATES: &[&str] = &[
    "prime-logger",
    "prime-registry",
    "prime-protocol",
    "prime-io",
    "prime-config",
    "prime-observability",
];
