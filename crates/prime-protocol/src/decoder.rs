// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Dual-format decoder front end

use prime_registry::Registry;
use serde_json::Value as Json;
use tracing::trace;

use crate::compact;
use crate::error::{DecodeError, Result};
use crate::json;
use crate::record::{Origin, Record};

/// Decoder behaviour switches
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Remote address whose application registrations also carry `ur_id`
    pub attribution_board: Option<String>,
}

/// Running counts of what the decoder has seen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    pub json: u64,
    pub compact: u64,
    pub malformed: u64,
    pub missing_field: u64,
    pub invalid_field: u64,
    pub unknown_type: u64,
    pub unknown_opcode: u64,
}

impl DecoderStats {
    /// Messages that produced a record
    pub fn decoded(&self) -> u64 {
        self.json + self.compact
    }

    fn count(&mut self, error: &DecodeError) {
        match error {
            DecodeError::MalformedMessage { .. } => self.malformed += 1,
            DecodeError::MissingRequiredField { .. } => self.missing_field += 1,
            DecodeError::InvalidFieldValue { .. } => self.invalid_field += 1,
            DecodeError::UnknownTypeReference { .. } => self.unknown_type += 1,
            DecodeError::UnknownOpcode { .. } => self.unknown_opcode += 1,
        }
    }
}

/// Owns the registry and turns raw datagrams into records
///
/// A payload that parses as a JSON object takes the self-describing path;
/// anything else is tried as a compact message.
#[derive(Debug, Default)]
pub struct Decoder {
    registry: Registry,
    config: DecoderConfig,
    stats: DecoderStats,
}

impl Decoder {
    pub fn new(config: DecoderConfig) -> Self {
        Self::with_registry(Registry::new(), config)
    }

    pub fn with_registry(registry: Registry, config: DecoderConfig) -> Self {
        Self {
            registry,
            config,
            stats: DecoderStats::default(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Decode one datagram
    ///
    /// Invalid UTF-8 is replaced rather than rejected, and trailing NULs or
    /// whitespace from C senders are ignored. On success the registry has
    /// already absorbed the message's effect.
    pub fn decode(&mut self, payload: &[u8], origin: &Origin) -> Result<Record> {
        let text = String::from_utf8_lossy(payload);
        let text = text.trim_end_matches(|c: char| c == '\0' || c.is_whitespace());

        let (result, self_describing) = match serde_json::from_str::<Json>(text) {
            Ok(msg @ Json::Object(_)) => (
                json::decode_object(
                    &msg,
                    origin,
                    self.config.attribution_board.as_deref(),
                    &mut self.registry,
                ),
                true,
            ),
            _ => (compact::decode(text, origin, &self.registry), false),
        };

        match &result {
            Ok(record) => {
                if self_describing {
                    self.stats.json += 1;
                } else {
                    self.stats.compact += 1;
                }
                for diagnostic in &record.diagnostics {
                    self.stats.count(diagnostic);
                }
                trace!("[DECODER] {} from {} decoded", record.api, origin);
            }
            Err(err) => self.stats.count(err),
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_object_takes_self_describing_path() {
        let mut decoder = Decoder::default();
        let record = decoder
            .decode(br#"{"type":"APP_REG","ts":1000,"data":{"proc_id":42}}"#, &Origin::Local)
            .unwrap();
        assert_eq!(record.render(), "source:UDS,api:APP_REG,ts:1000,proc_id:42,");
        assert!(decoder.registry().app(42).is_some());
        assert_eq!(decoder.stats().json, 1);
    }

    #[test]
    fn test_non_object_json_falls_back_to_compact() {
        let mut decoder = Decoder::default();
        let err = decoder.decode(b"12345", &Origin::Local).unwrap_err();
        assert!(matches!(err, DecodeError::MalformedMessage { .. }));
        assert_eq!(decoder.stats().malformed, 1);
    }

    #[test]
    fn test_trailing_nul_is_ignored() {
        let mut decoder = Decoder::default();
        let payload = "k\u{bf}1\u{bf}9\0".as_bytes();
        let record = decoder.decode(payload, &Origin::Local).unwrap();
        assert_eq!(record.ts, "9");
        assert_eq!(decoder.stats().compact, 1);
    }

    #[test]
    fn test_invalid_utf8_does_not_panic() {
        let mut decoder = Decoder::default();
        let err = decoder.decode(&[0xff, 0xfe, 0x00, 0x41], &Origin::Local).unwrap_err();
        assert!(err.is_fatal_for_message());
    }

    #[test]
    fn test_diagnostics_are_counted() {
        let mut decoder = Decoder::default();
        decoder
            .decode("i\u{bf}4\u{bf}1\u{bf}2".as_bytes(), &Origin::Local)
            .unwrap();
        decoder
            .decode(br#"{"type":"PRIME_UI_DEV_ERROR","ts":1}"#, &Origin::Local)
            .unwrap();
        let stats = decoder.stats();
        assert_eq!(stats.unknown_type, 1);
        assert_eq!(stats.missing_field, 1);
        assert_eq!(stats.decoded(), 2);
    }
}
