// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Core types for knob and monitor bookkeeping
//!
//! Semantic types travel on the wire as an index into a fixed vocabulary
//! (one per entity class and per knob/monitor). They are rendered by their
//! full protocol name, e.g. `PRIME_FREQ`.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::{RegistryError, Result};

/// Rendered in place of a knob/monitor type that cannot be resolved
pub const UNKNOWN_TYPE: &str = "ERROR: Unknown Type";

/// Knob / monitor identifier, unique within its owning entity
pub type ElementId = i64;

/// Opaque application identifier supplied by the registration handshake
pub type ProcId = i64;

macro_rules! semantic_type {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $wire:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Every variant, in wire index order
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Resolve a wire index; `None` when outside the vocabulary
            pub fn from_index(index: i64) -> Option<Self> {
                usize::try_from(index)
                    .ok()
                    .and_then(|i| Self::ALL.get(i).copied())
            }

            /// Position of this variant in the wire vocabulary
            pub fn index(self) -> usize {
                self as usize
            }

            /// Protocol name
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = RegistryError;

            /// Accepts the protocol name with or without its `PRIME_` prefix
            fn from_str(s: &str) -> Result<Self> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|t| {
                        let wire = t.as_str();
                        wire == s || wire.strip_prefix("PRIME_") == Some(s)
                    })
                    .ok_or_else(|| RegistryError::UnknownType {
                        vocabulary: stringify!($name),
                        value: s.to_string(),
                    })
            }
        }
    };
}

semantic_type! {
    /// Application-level knob types
    AppKnobType {
        Par => "PRIME_PAR",
        Prec => "PRIME_PREC",
        DevSel => "PRIME_DEV_SEL",
        Itr => "PRIME_ITR",
        Gen => "PRIME_GEN",
    }
}

semantic_type! {
    /// Application-level monitor types
    AppMonType {
        Perf => "PRIME_PERF",
        Acc => "PRIME_ACC",
        Err => "PRIME_ERR",
        Pow => "PRIME_POW",
    }
}

semantic_type! {
    /// Device-level knob types
    DevKnobType {
        Volt => "PRIME_VOLT",
        Freq => "PRIME_FREQ",
        En => "PRIME_EN",
        PmcCnt => "PRIME_PMC_CNT",
        Governor => "PRIME_GOVERNOR",
        FreqEn => "PRIME_FREQ_EN",
    }
}

semantic_type! {
    /// Device-level monitor types
    DevMonType {
        Pow => "PRIME_POW",
        Temp => "PRIME_TEMP",
        Cycles => "PRIME_CYCLES",
        Pmc => "PRIME_PMC",
    }
}

/// Discrete knobs/monitors carry integers, continuous ones floats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueClass {
    Discrete,
    Continuous,
}

impl fmt::Display for ValueClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueClass::Discrete => write!(f, "DISC"),
            ValueClass::Continuous => write!(f, "CONT"),
        }
    }
}

/// A knob or monitor value in the numeric kind of its class
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Numeric {
    Int(i64),
    Float(f64),
}

impl Numeric {
    pub fn class(&self) -> ValueClass {
        match self {
            Numeric::Int(_) => ValueClass::Discrete,
            Numeric::Float(_) => ValueClass::Continuous,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match *self {
            Numeric::Int(v) => v as f64,
            Numeric::Float(v) => v,
        }
    }
}

impl fmt::Display for Numeric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Numeric::Int(v) => write!(f, "{}", v),
            Numeric::Float(v) => f.write_str(&format_float(v)),
        }
    }
}

/// Render a float the way log consumers expect: integral values keep a
/// trailing `.0`, infinities render as `inf` / `-inf`.
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else if value.is_infinite() {
        let text = if value > 0.0 { "inf" } else { "-inf" };
        text.to_string()
    } else if value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

/// Writable control parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Knob<T> {
    pub id: ElementId,
    pub kind: T,
    pub min: Numeric,
    pub max: Numeric,
    pub init: Numeric,
}

impl<T> Knob<T> {
    pub fn new(id: ElementId, kind: T, min: Numeric, max: Numeric, init: Numeric) -> Self {
        Self {
            id,
            kind,
            min,
            max,
            init,
        }
    }

    pub fn class(&self) -> ValueClass {
        self.init.class()
    }
}

/// Observed metric
///
/// Device monitors are registered by id and type only, so bounds and weight
/// are optional.
#[derive(Debug, Clone, PartialEq)]
pub struct Monitor<T> {
    pub id: ElementId,
    pub kind: T,
    pub min: Option<Numeric>,
    pub max: Option<Numeric>,
    pub weight: Option<f64>,
}

impl<T> Monitor<T> {
    /// Monitor known only by id and type
    pub fn bare(id: ElementId, kind: T) -> Self {
        Self {
            id,
            kind,
            min: None,
            max: None,
            weight: None,
        }
    }

    pub fn with_bounds(
        id: ElementId,
        kind: T,
        min: Numeric,
        max: Numeric,
        weight: f64,
    ) -> Self {
        Self {
            id,
            kind,
            min: Some(min),
            max: Some(max),
            weight: Some(weight),
        }
    }
}

/// A device or application: two id-keyed collections
#[derive(Debug, Clone)]
pub struct Entity<K, M> {
    knobs: HashMap<ElementId, Knob<K>>,
    monitors: HashMap<ElementId, Monitor<M>>,
}

impl<K, M> Default for Entity<K, M> {
    fn default() -> Self {
        Self {
            knobs: HashMap::new(),
            monitors: HashMap::new(),
        }
    }
}

impl<K, M> Entity<K, M> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn knob(&self, id: ElementId) -> Option<&Knob<K>> {
        self.knobs.get(&id)
    }

    pub fn monitor(&self, id: ElementId) -> Option<&Monitor<M>> {
        self.monitors.get(&id)
    }

    pub fn knob_count(&self) -> usize {
        self.knobs.len()
    }

    pub fn monitor_count(&self) -> usize {
        self.monitors.len()
    }

    /// True when the entity has neither knobs nor monitors
    pub fn is_empty(&self) -> bool {
        self.knobs.is_empty() && self.monitors.is_empty()
    }

    pub(crate) fn insert_knob(&mut self, knob: Knob<K>) -> Option<Knob<K>> {
        self.knobs.insert(knob.id, knob)
    }

    pub(crate) fn insert_monitor(&mut self, monitor: Monitor<M>) -> Option<Monitor<M>> {
        self.monitors.insert(monitor.id, monitor)
    }

    pub(crate) fn remove_knob(&mut self, id: ElementId) -> Option<Knob<K>> {
        self.knobs.remove(&id)
    }

    pub(crate) fn remove_monitor(&mut self, id: ElementId) -> Option<Monitor<M>> {
        self.monitors.remove(&id)
    }
}

pub type Application = Entity<AppKnobType, AppMonType>;
pub type Device = Entity<DevKnobType, DevMonType>;

/// Outcome of a type lookup: never an error, at worst the unknown sentinel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeLookup<T> {
    Known(T),
    Unknown,
}

impl<T> TypeLookup<T> {
    pub fn known(self) -> Option<T> {
        match self {
            TypeLookup::Known(t) => Some(t),
            TypeLookup::Unknown => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, TypeLookup::Unknown)
    }
}

impl<T> From<Option<T>> for TypeLookup<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(t) => TypeLookup::Known(t),
            None => TypeLookup::Unknown,
        }
    }
}

impl<T: fmt::Display> fmt::Display for TypeLookup<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeLookup::Known(t) => write!(f, "{}", t),
            TypeLookup::Unknown => f.write_str(UNKNOWN_TYPE),
        }
    }
}
