// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Assembles the listener, queue, consumer and sink from a [`LoggerConfig`]

use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};

use anyhow::{anyhow, Context, Result};
use tracing::{info, warn};

use prime_config::LoggerConfig;
use prime_io::{
    Consumer, ConsumerThread, ListenMode, Listener, MessageQueue, QueueStats, Sink, SinkConfig,
    SinkHandle,
};
use prime_protocol::{Decoder, DecoderConfig};

/// Listening mode for `config`: UDP when a port is set, the local socket otherwise
pub fn listen_mode(config: &LoggerConfig) -> Result<ListenMode> {
    let listener = &config.listener;
    match listener.udp_port {
        Some(port) => {
            let host: IpAddr = listener
                .udp_bind_host
                .parse()
                .with_context(|| format!("Invalid UDP bind host '{}'", listener.udp_bind_host))?;
            Ok(ListenMode::Udp(SocketAddr::new(host, port)))
        }
        #[cfg(unix)]
        None => Ok(ListenMode::Local(listener.uds_path.clone())),
        #[cfg(not(unix))]
        None => Err(anyhow!(
            "Local socket mode is not supported on this platform; set listener.udp_port"
        )),
    }
}

/// Resolved visualizer endpoint, or `None` when the mirror is disabled
pub fn visualizer_endpoint(config: &LoggerConfig) -> Result<Option<SocketAddr>> {
    let visualizer = &config.visualizer;
    if !visualizer.enabled {
        return Ok(None);
    }
    let endpoint = visualizer.endpoint();
    let addr = (visualizer.address.as_str(), visualizer.port)
        .to_socket_addrs()
        .with_context(|| format!("Failed to resolve visualizer {}", endpoint))?
        .next()
        .ok_or_else(|| anyhow!("Visualizer {} resolved to no address", endpoint))?;
    Ok(Some(addr))
}

/// Record destination: the configured output file (appended) or stdout
pub fn open_output(config: &LoggerConfig) -> Result<Box<dyn Write + Send>> {
    match &config.output.path {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open record file {}", path.display()))?;
            info!("[LOGGER] Writing records to {}", path.display());
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(std::io::stdout())),
    }
}

/// A running logger: one listener thread feeding one consumer thread
pub struct LoggerRuntime {
    mode: ListenMode,
    listener: Listener,
    worker: ConsumerThread,
    sink: SinkHandle,
    queue: MessageQueue,
}

impl LoggerRuntime {
    /// Start consuming, then bind the listener
    ///
    /// # Errors
    ///
    /// Fails when the visualizer cannot be resolved, the worker cannot be
    /// spawned or the socket cannot be bound. Nothing is processed in that case.
    pub fn start(config: &LoggerConfig, writer: Box<dyn Write + Send>) -> Result<Self> {
        let mode = listen_mode(config)?;

        let sink = Sink::new(
            writer,
            SinkConfig {
                file_filter: config.output.file_filter.clone(),
                visual_filter: config.output.visual_filter.clone(),
                visualizer: visualizer_endpoint(config)?,
            },
        )
        .context("Failed to create record sink")?;
        let sink_handle = sink.handle();

        let decoder = Decoder::new(DecoderConfig {
            attribution_board: Some(config.boards.attribution_board().to_string()),
        });

        let queue = MessageQueue::new();
        let worker = Consumer::new(decoder, sink, queue.counters())
            .spawn(queue.receiver())
            .context("Failed to start consumer")?;

        let listener = Listener::bind(&mode, config.listener.max_datagram_size, queue.sender())
            .context("Failed to start listener")?;

        info!("[LOGGER] Listening in {} mode", describe(&mode));

        Ok(Self {
            mode,
            listener,
            worker,
            sink: sink_handle,
            queue,
        })
    }

    pub fn mode(&self) -> &ListenMode {
        &self.mode
    }

    /// Bound UDP address (useful when the configured port was 0)
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &self.listener {
            Listener::Udp(udp) => Some(udp.local_addr()),
            #[cfg(unix)]
            Listener::Local(_) => None,
        }
    }

    pub fn queue_stats(&self) -> QueueStats {
        self.queue.stats()
    }

    pub fn is_running(&self) -> bool {
        self.listener.is_running() && self.worker.is_running()
    }

    /// Stop receiving, discard whatever is still queued and flush the output
    ///
    /// The local socket file is removed when the listener stops.
    pub fn shutdown(mut self) {
        self.listener.stop();
        self.worker.stop();

        let stats = self.queue.stats();
        if stats.backlog() > 0 {
            info!("[LOGGER] Discarding {} queued message(s)", stats.backlog());
        }
        if let Err(e) = self.sink.flush() {
            warn!("[LOGGER] Flush on shutdown failed: {}", e);
        }
        info!(
            "[LOGGER] Stopped after {} message(s) received, {} processed",
            stats.received, stats.processed
        );
    }
}

fn describe(mode: &ListenMode) -> String {
    match mode {
        ListenMode::Udp(addr) => format!("remote (UDP {})", addr),
        #[cfg(unix)]
        ListenMode::Local(path) => format!("local ({})", path.display()),
    }
}
