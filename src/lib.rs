// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # PRiME Logger
//!
//! Telemetry hub for a runtime-management framework. Devices, applications
//! and the resource manager send knob and monitor traffic over datagram
//! sockets; the logger decodes every message, tracks per-entity state and
//! writes one normalized record per message.
//!
//! ## Crates
//!
//! - [`registry`]: knob/monitor model and the entity registry
//! - [`protocol`]: self-describing (JSON) and compact decoders
//! - [`io`]: listeners, message queue, consumer worker and output sink
//! - [`config`]: `prime_logger.toml` loading with env/CLI overrides
//! - [`observability`]: tracing setup and per-crate debug flags
//!
//! ## Embedding
//!
//! ```rust,no_run
//! use prime_logger::config::LoggerConfig;
//! use prime_logger::LoggerRuntime;
//!
//! let mut config = LoggerConfig::default();
//! config.listener.udp_port = Some(5000);
//!
//! let runtime = LoggerRuntime::start(&config, Box::new(std::io::stdout()))?;
//! // ... traffic flows until ...
//! runtime.shutdown();
//! # Ok::<(), anyhow::Error>(())
//! ```

pub use prime_config as config;
pub use prime_io as io;
pub use prime_observability as observability;
pub use prime_protocol as protocol;
pub use prime_registry as registry;

mod runtime;

pub use runtime::{listen_mode, open_output, visualizer_endpoint, LoggerRuntime};

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Commonly used types
pub mod prelude {
    pub use crate::config::{load_config, validate_config, LoggerConfig};
    pub use crate::io::{Consumer, ListenMode, Listener, MemorySink, MessageQueue, Sink, SinkConfig};
    pub use crate::protocol::{Decoder, DecoderConfig, Origin, Record};
    pub use crate::registry::Registry;
    pub use crate::LoggerRuntime;
}
