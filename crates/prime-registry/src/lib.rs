// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Device and application state for the PRiME logger
//!
//! Tracks which knobs and monitors each device and application has registered
//! so that compact messages, which omit the semantic type, can be annotated
//! with it. The registry performs no I/O.

pub mod registry;
pub mod types;

pub use registry::Registry;
pub use types::{
    format_float, AppKnobType, AppMonType, Application, DevKnobType, DevMonType, Device,
    ElementId, Entity, Knob, Monitor, Numeric, ProcId, TypeLookup, ValueClass, UNKNOWN_TYPE,
};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Unknown {vocabulary} value: {value}")]
    UnknownType {
        vocabulary: &'static str,
        value: String,
    },
}

pub type Result<T> = std::result::Result<T, RegistryError>;
