// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Logging initialization for the PRiME logger
//!
//! Console diagnostics always go to stderr, since stdout may be carrying
//! records. With the `file-logging` feature and a configured `log_dir`, each
//! run additionally writes rolling JSON logs into its own timestamped folder.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::cli::CrateDebugFlags;
use crate::config::{LogFormat, LoggingConfig};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

const RUN_PREFIX: &str = "run_";
const RUN_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Logging initialization result
///
/// Keep it alive for the lifetime of the process; dropping it flushes any
/// buffered file output.
pub struct LoggingGuard {
    #[cfg(feature = "file-logging")]
    _file_guards: Vec<tracing_appender::non_blocking::WorkerGuard>,
    log_dir: Option<PathBuf>,
    started_at: DateTime<Utc>,
}

impl LoggingGuard {
    /// Run folder receiving log files, if file logging is active
    pub fn log_dir(&self) -> Option<&Path> {
        self.log_dir.as_deref()
    }

    /// Time since logging was initialized
    pub fn uptime(&self) -> chrono::Duration {
        Utc::now() - self.started_at
    }
}

/// Initialize the global subscriber
///
/// The effective filter is `config.level` for everything, raised to `debug`
/// for each crate named in `debug_flags`.
///
/// Folder layout with file logging:
/// ```text
/// <log_dir>/
///   └── run_20250101_120000/
///       ├── prime-protocol.log
///       ├── prime-io.log
///       └── prime-logger.log (combined)
/// ```
///
/// # Errors
///
/// Fails when the filter does not parse, the run folder cannot be created,
/// or a global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig, debug_flags: &CrateDebugFlags) -> Result<LoggingGuard> {
    let filter = debug_flags.to_filter_string_with_default(&config.level.to_lowercase());
    let make_filter = || {
        EnvFilter::try_new(&filter).with_context(|| format!("Invalid log filter: {}", filter))
    };

    let mut layers: Vec<BoxedLayer> = Vec::new();

    let console = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_file(false)
        .with_line_number(false);
    let console_layer = match config.format {
        LogFormat::Json => console.json().with_filter(make_filter()?).boxed(),
        LogFormat::Text => console.with_filter(make_filter()?).boxed(),
    };
    layers.push(console_layer);

    #[cfg(feature = "file-logging")]
    let mut file_guards = Vec::new();
    #[cfg(feature = "file-logging")]
    let log_dir = match &config.log_dir {
        Some(base) => Some(file_layers(
            base,
            config.retention_runs,
            &filter,
            &mut layers,
            &mut file_guards,
        )?),
        None => None,
    };
    #[cfg(not(feature = "file-logging"))]
    let log_dir: Option<PathBuf> = None;

    Registry::default()
        .with(layers)
        .try_init()
        .context("Failed to install the global tracing subscriber")?;

    report_unused_log_dir(config);

    Ok(LoggingGuard {
        #[cfg(feature = "file-logging")]
        _file_guards: file_guards,
        log_dir,
        started_at: Utc::now(),
    })
}

#[cfg(feature = "file-logging")]
fn report_unused_log_dir(_config: &LoggingConfig) {}

#[cfg(not(feature = "file-logging"))]
fn report_unused_log_dir(config: &LoggingConfig) {
    if let Some(requested) = &config.log_dir {
        tracing::warn!(
            "[LOGGING] log_dir {} ignored: built without file-logging",
            requested.display()
        );
    }
}

/// Per-crate and combined JSON file layers in a fresh run folder
#[cfg(feature = "file-logging")]
fn file_layers(
    base_log_dir: &Path,
    retention_runs: usize,
    filter: &str,
    layers: &mut Vec<BoxedLayer>,
    guards: &mut Vec<tracing_appender::non_blocking::WorkerGuard>,
) -> Result<PathBuf> {
    use tracing_appender::rolling;

    let timestamp = Utc::now().format(RUN_TIMESTAMP_FORMAT);
    let run_folder = base_log_dir.join(format!("{}{}", RUN_PREFIX, timestamp));
    std::fs::create_dir_all(&run_folder)
        .with_context(|| format!("Failed to create log directory: {}", run_folder.display()))?;

    cleanup_old_logs(base_log_dir, retention_runs)?;

    for crate_name in crate::KNOWN_CRATES {
        let appender = rolling::daily(&run_folder, format!("{}.log", crate_name));
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        guards.push(guard);

        let target = crate_name.replace('-', "_");
        let crate_filter = EnvFilter::try_new(format!("off,{}=debug", target))
            .with_context(|| format!("Invalid log filter for {}", crate_name))?;
        layers.push(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .json()
                .with_filter(crate_filter)
                .boxed(),
        );
    }

    let combined = rolling::daily(&run_folder, "prime-logger.log");
    let (combined_non_blocking, combined_guard) = tracing_appender::non_blocking(combined);
    guards.push(combined_guard);
    layers.push(
        tracing_subscriber::fmt::layer()
            .with_writer(combined_non_blocking)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .json()
            .with_filter(
                EnvFilter::try_new(filter)
                    .with_context(|| format!("Invalid log filter: {}", filter))?,
            )
            .boxed(),
    );

    Ok(run_folder)
}

/// Remove all but the `retention_runs` most recent run folders under `base_log_dir`
///
/// Entries that are not `run_<timestamp>` directories are left alone. Returns
/// the number of folders removed.
pub fn cleanup_old_logs(base_log_dir: &Path, retention_runs: usize) -> Result<usize> {
    if !base_log_dir.exists() {
        return Ok(0);
    }

    let mut runs: Vec<(PathBuf, DateTime<Utc>)> = Vec::new();
    let entries = std::fs::read_dir(base_log_dir)
        .with_context(|| format!("Failed to read log directory: {}", base_log_dir.display()))?;

    for entry in entries {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        let Some(stamp) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_prefix(RUN_PREFIX))
        else {
            continue;
        };
        if let Ok(naive) = NaiveDateTime::parse_from_str(stamp, RUN_TIMESTAMP_FORMAT) {
            runs.push((path, Utc.from_utc_datetime(&naive)));
        }
    }

    if runs.len() <= retention_runs {
        return Ok(0);
    }

    // Oldest first
    runs.sort_by_key(|(_, dt)| *dt);
    let excess = runs.len() - retention_runs;

    let mut removed = 0;
    for (path, _) in runs.iter().take(excess) {
        match std::fs::remove_dir_all(path) {
            Ok(()) => removed += 1,
            Err(e) => eprintln!(
                "Warning: Failed to remove old log directory {}: {}",
                path.display(),
                e
            ),
        }
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleanup_keeps_most_recent_runs() {
        let base = tempfile::tempdir().unwrap();
        for stamp in [
            "20250101_120000",
            "20250102_120000",
            "20250103_120000",
            "20250104_120000",
        ] {
            std::fs::create_dir(base.path().join(format!("run_{}", stamp))).unwrap();
        }
        std::fs::create_dir(base.path().join("keep_me")).unwrap();
        std::fs::create_dir(base.path().join("run_not_a_date")).unwrap();

        assert_eq!(cleanup_old_logs(base.path(), 2).unwrap(), 2);

        assert!(!base.path().join("run_20250101_120000").exists());
        assert!(!base.path().join("run_20250102_120000").exists());
        assert!(base.path().join("run_20250103_120000").exists());
        assert!(base.path().join("run_20250104_120000").exists());
        assert!(base.path().join("keep_me").exists());
        assert!(base.path().join("run_not_a_date").exists());
    }

    #[test]
    fn test_cleanup_missing_dir() {
        let base = tempfile::tempdir().unwrap();
        assert_eq!(cleanup_old_logs(&base.path().join("absent"), 1).unwrap(), 0);
    }

    #[test]
    fn test_init_installs_once() {
        let flags = CrateDebugFlags::from_args(vec!["--debug-prime-io".to_string()]);

        let guard = init_logging(&LoggingConfig::default(), &flags).unwrap();
        assert!(guard.log_dir().is_none());
        assert!(guard.uptime() >= chrono::Duration::zero());

        assert!(init_logging(&LoggingConfig::default(), &CrateDebugFlags::default()).is_err());
    }
}
