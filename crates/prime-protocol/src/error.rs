// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Decode error taxonomy
//!
//! Every variant is recoverable at single-message granularity: the consumer
//! logs it and moves on to the next datagram.

use thiserror::Error;

/// Errors produced while decoding one datagram
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// Neither a self-describing object nor any compact layout
    #[error("message not in self-describing or compact format: {payload}")]
    MalformedMessage { payload: String },

    /// A schema-required key is absent
    #[error("{message_type}: required field '{field}' not present")]
    MissingRequiredField { message_type: String, field: String },

    /// A required key is present but holds the wrong kind of value
    #[error("{message_type}: field '{field}' is not a valid {expected}")]
    InvalidFieldValue {
        message_type: String,
        field: String,
        expected: &'static str,
    },

    /// A knob/monitor type could not be resolved (registry miss or bad index)
    #[error("{message_type}: unknown type for {detail}")]
    UnknownTypeReference { message_type: String, detail: String },

    /// Compact opcode outside the fixed table
    #[error("unknown compact opcode '{opcode}': {payload}")]
    UnknownOpcode { opcode: String, payload: String },
}

impl DecodeError {
    /// True when the payload matched no message format at all
    pub fn is_fatal_for_message(&self) -> bool {
        matches!(
            self,
            DecodeError::MalformedMessage { .. } | DecodeError::UnknownOpcode { .. }
        )
    }

    pub(crate) fn missing(message_type: &str, field: impl Into<String>) -> Self {
        DecodeError::MissingRequiredField {
            message_type: message_type.to_string(),
            field: field.into(),
        }
    }

    pub(crate) fn malformed(payload: &str) -> Self {
        DecodeError::MalformedMessage {
            payload: printable(payload),
        }
    }
}

/// Escape control characters so an echoed payload stays on one log line
pub(crate) fn printable(payload: &str) -> String {
    payload.escape_debug().to_string()
}

/// Result type for decode operations
pub type Result<T> = std::result::Result<T, DecodeError>;
