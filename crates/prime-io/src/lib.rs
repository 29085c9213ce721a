// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! PRiME logger I/O
//!
//! Listener threads receive datagrams and push them onto an unbounded
//! [`MessageQueue`]; a single [`Consumer`] worker pops them in arrival order,
//! decodes them and hands the records to the [`Sink`].
//!
//! ```text
//! socket --> listener thread --> MessageQueue --> consumer thread --> Sink
//!                                                   (Decoder +         |-> stdout / file
//!                                                    Registry)         `-> visualizer (UDP)
//! ```

pub mod channels;
pub mod listener;
pub mod sink;
pub mod worker;

pub use channels::{MessageQueue, QueueCounters, QueueSender, QueueStats};
#[cfg(unix)]
pub use listener::LocalListener;
pub use listener::{ListenMode, Listener, UdpListener};
pub use sink::{MemorySink, Sink, SinkConfig, SinkHandle, TypeFilter};
pub use worker::{Consumer, ConsumerThread};

use prime_protocol::Origin;
use thiserror::Error;

/// One received datagram, tagged with where it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    pub payload: Vec<u8>,
    pub origin: Origin,
}

impl Datagram {
    pub fn new(payload: impl Into<Vec<u8>>, origin: Origin) -> Self {
        Self {
            payload: payload.into(),
            origin,
        }
    }
}

/// Errors that can occur in logger I/O
#[derive(Error, Debug)]
pub enum IoError {
    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Output error: {0}")]
    Output(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Not running: {0}")]
    NotRunning(String),
}

/// Result type for logger I/O operations
pub type Result<T> = std::result::Result<T, IoError>;
