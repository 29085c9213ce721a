// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! PRiME wire protocol decoding
//!
//! Every datagram is either a self-describing JSON object carrying a `type`
//! tag, a timestamp and a type-specific body, or a compact delimiter-separated
//! message keyed by a one-character opcode. [`Decoder`] accepts both, updates
//! the [`prime_registry::Registry`] it owns and produces one [`Record`] per
//! message.
//!
//! ```
//! use prime_protocol::{Decoder, Origin};
//!
//! let mut decoder = Decoder::default();
//! let record = decoder
//!     .decode(br#"{"type":"APP_REG","ts":1000,"data":{"proc_id":42}}"#, &Origin::Local)
//!     .unwrap();
//! assert_eq!(record.render(), "source:UDS,api:APP_REG,ts:1000,proc_id:42,");
//! ```

pub mod catalog;
pub mod compact;
pub mod decoder;
pub mod error;
mod json;
pub mod record;
pub mod schema;

pub use catalog::{Catalog, API_PREFIX};
pub use compact::{Layout, Opcode, DELIMITER, OPCODES};
pub use decoder::{Decoder, DecoderConfig, DecoderStats};
pub use error::{DecodeError, Result};
pub use record::{Origin, Record, RecordBody, SinkControl, LOCAL_SOURCE, MISSING_FIELD_MARKER};
pub use schema::FilterTarget;
