// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Canonical output record
//!
//! A record renders as comma-terminated `key:value` pairs:
//! `source:<addr|UDS>,api:<type>,ts:<ts>,<fields...>`

use std::fmt;

use crate::error::DecodeError;
use crate::schema::FilterTarget;

/// Literal emitted in place of the field section when a required field is absent
pub const MISSING_FIELD_MARKER: &str = "\"Required Field Not Present\",";

/// Label and registry key for datagrams received on the local socket
pub const LOCAL_SOURCE: &str = "UDS";

/// Where a datagram came from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Local datagram socket
    Local,
    /// Remote UDP peer, identified by its IP address
    Remote(String),
}

impl Origin {
    /// Rendered `source` value, also used as the device key
    pub fn label(&self) -> &str {
        match self {
            Origin::Local => LOCAL_SOURCE,
            Origin::Remote(addr) => addr,
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Origin::Remote(_))
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Field section of a record
#[derive(Debug, Clone, PartialEq)]
pub enum RecordBody {
    Fields(Vec<(&'static str, String)>),
    /// A required field was absent or ill-typed
    MissingField,
}

/// Instruction for the output sink carried by a decoded message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkControl {
    SetFilter {
        target: FilterTarget,
        tags: Vec<String>,
    },
}

/// One decoded message
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub source: String,
    /// Type tag exactly as received
    pub api: String,
    pub ts: String,
    pub body: RecordBody,
    /// Non-fatal problems found while decoding
    pub diagnostics: Vec<DecodeError>,
    pub control: Option<SinkControl>,
}

impl Record {
    pub fn new(origin: &Origin, api: impl Into<String>, ts: impl Into<String>) -> Self {
        Self {
            source: origin.label().to_string(),
            api: api.into(),
            ts: ts.into(),
            body: RecordBody::Fields(Vec::new()),
            diagnostics: Vec::new(),
            control: None,
        }
    }

    /// Append a rendered field; ignored once the body is the missing-field marker
    pub fn push(&mut self, key: &'static str, value: impl fmt::Display) {
        if let RecordBody::Fields(fields) = &mut self.body {
            fields.push((key, value.to_string()));
        }
    }

    /// Replace the whole field section with the missing-field marker
    pub fn mark_missing(&mut self, error: DecodeError) {
        self.body = RecordBody::MissingField;
        self.diagnostics.push(error);
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        match &self.body {
            RecordBody::Fields(fields) => fields
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.as_str()),
            RecordBody::MissingField => None,
        }
    }

    pub fn is_missing_field(&self) -> bool {
        matches!(self.body, RecordBody::MissingField)
    }

    /// Canonical text line (without newline)
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "source:{},api:{},ts:{},", self.source, self.api, self.ts)?;
        match &self.body {
            RecordBody::Fields(fields) => {
                for (key, value) in fields {
                    write!(f, "{}:{},", key, value)?;
                }
                Ok(())
            }
            RecordBody::MissingField => f.write_str(MISSING_FIELD_MARKER),
        }
    }
}
