// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! `prime-logger` binary
//!
//! Listens on a local datagram socket (or UDP with `--port`), decodes every
//! message and writes one record per line to stdout or `--output`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use prime_logger::config::{load_config, validate_config, LoggerConfig};
use prime_logger::observability::{
    debug_flags_help, init_logging, parse_debug_flags, LogFormat, LoggingConfig,
};
use prime_logger::{open_output, LoggerRuntime};

/// PRiME Logger - telemetry hub for runtime-management traffic
#[derive(Parser, Debug)]
#[command(name = "prime-logger", version, author, long_about = None, after_help = debug_flags_help())]
struct Args {
    /// Listen for remote devices on this UDP port instead of the local socket
    #[arg(short, long)]
    port: Option<u16>,

    /// Local datagram socket path
    #[arg(long)]
    uds_path: Option<PathBuf>,

    /// Mirror records to the visualizer
    #[arg(short = 'v', long, default_value_t = false)]
    visualiser: bool,

    /// Visualizer address (enables the visualizer)
    #[arg(long, alias = "visualiser_addr")]
    visualiser_addr: Option<String>,

    /// Visualizer port (enables the visualizer)
    #[arg(long, alias = "visualiser_port")]
    visualiser_port: Option<u16>,

    /// Address of board a
    #[arg(short = 'a', long)]
    boarda: Option<String>,

    /// Address of board b
    #[arg(short = 'b', long)]
    boardb: Option<String>,

    /// Address of board c (application registrations from it carry a ur_id)
    #[arg(short = 'c', long)]
    boardc: Option<String>,

    /// Configuration file (default: search for prime_logger.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Append records to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Diagnostic log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    /// Overrides in the form `apply_cli_overrides` expects
    fn overrides(&self) -> HashMap<String, String> {
        let mut cli = HashMap::new();
        let mut put = |key: &str, value: Option<String>| {
            if let Some(value) = value {
                cli.insert(key.to_string(), value);
            }
        };

        put("port", self.port.map(|p| p.to_string()));
        put("uds_path", self.uds_path.as_ref().map(|p| p.display().to_string()));
        put("visualiser", self.visualiser.then(|| "true".to_string()));
        put("visualiser_addr", self.visualiser_addr.clone());
        put("visualiser_port", self.visualiser_port.map(|p| p.to_string()));
        put("boarda", self.boarda.clone());
        put("boardb", self.boardb.clone());
        put("boardc", self.boardc.clone());
        put("output", self.output.as_ref().map(|p| p.display().to_string()));
        put("log_level", self.log_level.clone());
        cli
    }
}

fn main() -> Result<()> {
    // --debug-* flags are handled by prime-observability, not clap
    let args = Args::parse_from(std::env::args().filter(|arg| !arg.starts_with("--debug-")));
    let debug_flags = parse_debug_flags();

    let config = load_config(args.config.as_deref(), Some(&args.overrides()))
        .context("Failed to load configuration")?;
    validate_config(&config).context("Invalid configuration")?;

    let logging = init_logging(&logging_config(&config)?, &debug_flags)
        .context("Failed to initialize logging")?;
    if debug_flags.any_enabled() {
        info!("[LOGGER] Debug enabled for: {:?}", debug_flags.enabled_crates());
    }

    info!("[LOGGER] PRiME logger v{}", prime_logger::VERSION);
    if let Some(dir) = logging.log_dir() {
        info!("[LOGGER] Writing logs to {}", dir.display());
    }
    let runtime = LoggerRuntime::start(&config, open_output(&config)?)?;

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("Failed to install signal handler")?;

    while running.load(Ordering::SeqCst) {
        if !runtime.is_running() {
            warn!("[LOGGER] Listener or consumer stopped unexpectedly");
            break;
        }
        std::thread::sleep(Duration::from_millis(100));
    }

    info!(
        "[LOGGER] Shutting down after {}s",
        logging.uptime().num_seconds()
    );
    runtime.shutdown();
    Ok(())
}

fn logging_config(config: &LoggerConfig) -> Result<LoggingConfig> {
    let format = config
        .logging
        .format
        .parse::<LogFormat>()
        .map_err(anyhow::Error::msg)?;
    Ok(LoggingConfig {
        level: config.logging.level.clone(),
        format,
        log_dir: config.logging.log_dir.clone(),
        retention_runs: config.logging.retention_runs,
    })
}
