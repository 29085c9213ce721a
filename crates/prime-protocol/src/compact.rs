// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Compact ("fast") message decoding
//!
//! Compact messages are delimiter-separated token lists whose first token is a
//! one-character opcode. The token count alone selects the layout:
//!
//! | tokens | layout                         |
//! |--------|--------------------------------|
//! | 6      | `op¿id¿val¿min¿max¿ts`         |
//! | 5      | `op¿id¿val¿proc_id¿ts`         |
//! | 4      | `op¿id¿proc_id¿ts` (app) or `op¿id¿val¿ts` (device) |
//! | 3      | `op¿id¿ts`                     |
//!
//! None of the layouts carries the semantic type; it is inferred from the
//! registry and rendered as a trailing `type` field.

use std::fmt;

use prime_registry::{ElementId, ProcId, Registry, TypeLookup};

use crate::error::{printable, DecodeError, Result};
use crate::record::{Origin, Record};

/// Token separator; never occurs inside a field value
pub const DELIMITER: char = '\u{00BF}';

/// Which entity an opcode refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    App,
    Device,
}

/// Whether an opcode refers to a knob or a monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Knob,
    Monitor,
}

/// One entry of the opcode table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opcode {
    pub code: char,
    pub tag: &'static str,
    pub scope: Scope,
    pub target: Target,
}

const fn op(code: char, tag: &'static str, scope: Scope, target: Target) -> Opcode {
    Opcode {
        code,
        tag,
        scope,
        target,
    }
}

/// Fixed opcode table
pub const OPCODES: [Opcode; 22] = [
    op('0', "PRIME_API_APP_RETURN_KNOB_DISC_GET", Scope::App, Target::Knob),
    op('1', "PRIME_API_APP_RETURN_KNOB_CONT_GET", Scope::App, Target::Knob),
    op('2', "PRIME_API_APP_KNOB_DISC_MIN", Scope::App, Target::Knob),
    op('3', "PRIME_API_APP_KNOB_DISC_MAX", Scope::App, Target::Knob),
    op('4', "PRIME_API_APP_KNOB_CONT_MIN", Scope::App, Target::Knob),
    op('5', "PRIME_API_APP_KNOB_CONT_MAX", Scope::App, Target::Knob),
    op('6', "PRIME_API_APP_KNOB_DISC_GET", Scope::App, Target::Knob),
    op('7', "PRIME_API_APP_KNOB_CONT_GET", Scope::App, Target::Knob),
    op('8', "PRIME_API_APP_MON_DISC_MIN", Scope::App, Target::Monitor),
    op('9', "PRIME_API_APP_MON_DISC_MAX", Scope::App, Target::Monitor),
    op('a', "PRIME_API_APP_MON_DISC_WEIGHT", Scope::App, Target::Monitor),
    op('b', "PRIME_API_APP_MON_CONT_MIN", Scope::App, Target::Monitor),
    op('c', "PRIME_API_APP_MON_CONT_MAX", Scope::App, Target::Monitor),
    op('d', "PRIME_API_APP_MON_CONT_WEIGHT", Scope::App, Target::Monitor),
    op('e', "PRIME_API_APP_MON_DISC_SET", Scope::App, Target::Monitor),
    op('f', "PRIME_API_APP_MON_CONT_SET", Scope::App, Target::Monitor),
    op('g', "PRIME_API_DEV_KNOB_DISC_SET", Scope::Device, Target::Knob),
    op('h', "PRIME_API_DEV_KNOB_CONT_SET", Scope::Device, Target::Knob),
    op('i', "PRIME_API_DEV_MON_DISC_GET", Scope::Device, Target::Monitor),
    op('j', "PRIME_API_DEV_MON_CONT_GET", Scope::Device, Target::Monitor),
    op('k', "PRIME_API_DEV_RETURN_MON_DISC_GET", Scope::Device, Target::Monitor),
    op('l', "PRIME_API_DEV_RETURN_MON_CONT_GET", Scope::Device, Target::Monitor),
];

/// Look up a single-character opcode token
pub fn opcode(token: &str) -> Option<&'static Opcode> {
    let mut chars = token.chars();
    let code = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    OPCODES.iter().find(|op| op.code == code)
}

/// Positional layout, selected by token count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Bounded,
    WithProcId,
    Short,
    Bare,
}

impl Layout {
    pub fn from_arity(tokens: usize) -> Option<Self> {
        match tokens {
            6 => Some(Layout::Bounded),
            5 => Some(Layout::WithProcId),
            4 => Some(Layout::Short),
            3 => Some(Layout::Bare),
            _ => None,
        }
    }
}

/// Decode a compact payload
///
/// Value tokens are rendered verbatim; only `id` and `proc_id` are parsed.
/// An unresolved type renders as the unknown-type sentinel and adds an
/// [`DecodeError::UnknownTypeReference`] diagnostic to the record.
pub fn decode(text: &str, origin: &Origin, registry: &Registry) -> Result<Record> {
    let tokens: Vec<&str> = text.split(DELIMITER).collect();
    let layout = Layout::from_arity(tokens.len()).ok_or_else(|| DecodeError::malformed(text))?;

    let op = opcode(tokens[0]).ok_or_else(|| DecodeError::UnknownOpcode {
        opcode: printable(tokens[0]),
        payload: printable(text),
    })?;
    let id = parse_int(tokens[1], text)?;
    let ts = tokens[tokens.len() - 1].trim();

    let mut record = Record::new(origin, op.tag, ts);
    record.push("id", id);

    let pid = match layout {
        Layout::Bounded => {
            record.push("val", tokens[2]);
            record.push("min", tokens[3]);
            record.push("max", tokens[4]);
            None
        }
        Layout::WithProcId => {
            let pid = parse_int(tokens[3], text)?;
            record.push("val", tokens[2]);
            record.push("proc_id", pid);
            Some(pid)
        }
        Layout::Short => match op.scope {
            Scope::App => {
                let pid = parse_int(tokens[2], text)?;
                record.push("proc_id", pid);
                Some(pid)
            }
            Scope::Device => {
                record.push("val", tokens[2]);
                None
            }
        },
        Layout::Bare => return Ok(record),
    };

    match infer_type(op, origin, pid, id, registry) {
        Some((name, true)) => record.push("type", name),
        Some((sentinel, false)) => {
            record.push("type", sentinel);
            let owner = match op.scope {
                Scope::App => format!("app {}", pid.unwrap_or_default()),
                Scope::Device => format!("device {}", origin),
            };
            let element = match op.target {
                Target::Knob => "knob",
                Target::Monitor => "monitor",
            };
            record.diagnostics.push(DecodeError::UnknownTypeReference {
                message_type: op.tag.to_string(),
                detail: format!("{} {} of {}", element, id, owner),
            });
        }
        // app message without a proc_id cannot be resolved
        None => record.push("type", ""),
    }

    Ok(record)
}

/// Rendered type and whether it resolved; `None` when there is nothing to resolve against
fn infer_type(
    op: &Opcode,
    origin: &Origin,
    pid: Option<ProcId>,
    id: ElementId,
    registry: &Registry,
) -> Option<(String, bool)> {
    let resolved = match (op.scope, op.target) {
        (Scope::Device, Target::Knob) => rendered(registry.lookup_device_knob_type(origin.label(), id)),
        (Scope::Device, Target::Monitor) => {
            rendered(registry.lookup_device_monitor_type(origin.label(), id))
        }
        (Scope::App, Target::Knob) => rendered(registry.lookup_app_knob_type(pid?, id)),
        (Scope::App, Target::Monitor) => rendered(registry.lookup_app_monitor_type(pid?, id)),
    };
    Some(resolved)
}

fn rendered<T: fmt::Display>(lookup: TypeLookup<T>) -> (String, bool) {
    (lookup.to_string(), !lookup.is_unknown())
}

fn parse_int(token: &str, text: &str) -> Result<i64> {
    token
        .trim()
        .parse::<i64>()
        .map_err(|_| DecodeError::malformed(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use prime_registry::{AppKnobType, DevKnobType, Knob, Numeric};

    fn compact(tokens: &[&str]) -> String {
        tokens.join(&DELIMITER.to_string())
    }

    fn registry_with_freq_knob() -> Registry {
        let mut registry = Registry::new();
        registry.upsert_device_knob(
            "UDS",
            Knob::new(
                3,
                DevKnobType::Freq,
                Numeric::Int(100),
                Numeric::Int(2000),
                Numeric::Int(800),
            ),
        );
        registry
    }

    #[test]
    fn test_opcode_table_is_unique() {
        for (i, a) in OPCODES.iter().enumerate() {
            for b in &OPCODES[i + 1..] {
                assert_ne!(a.code, b.code);
                assert_ne!(a.tag, b.tag);
            }
        }
        assert_eq!(opcode("g").unwrap().tag, "PRIME_API_DEV_KNOB_DISC_SET");
        assert!(opcode("gg").is_none());
        assert!(opcode("").is_none());
    }

    #[test]
    fn test_arity_selects_layout() {
        assert_eq!(Layout::from_arity(6), Some(Layout::Bounded));
        assert_eq!(Layout::from_arity(3), Some(Layout::Bare));
        assert_eq!(Layout::from_arity(2), None);
        assert_eq!(Layout::from_arity(7), None);
    }

    #[test]
    fn test_device_set_resolves_registered_type() {
        let registry = registry_with_freq_knob();
        let record = decode(&compact(&["g", "3", "1200", "99"]), &Origin::Local, &registry).unwrap();
        assert_eq!(
            record.render(),
            "source:UDS,api:PRIME_API_DEV_KNOB_DISC_SET,ts:99,id:3,val:1200,type:PRIME_FREQ,"
        );
        assert!(record.diagnostics.is_empty());
    }

    #[test]
    fn test_bounded_layout_renders_raw_values() {
        let registry = registry_with_freq_knob();
        let record = decode(
            &compact(&["h", "3", "1.5", "0.5", "2.5", "10"]),
            &Origin::Local,
            &registry,
        )
        .unwrap();
        assert_eq!(
            record.render(),
            "source:UDS,api:PRIME_API_DEV_KNOB_CONT_SET,ts:10,id:3,val:1.5,min:0.5,max:2.5,type:PRIME_FREQ,"
        );
    }

    #[test]
    fn test_bounded_app_layout_has_empty_type() {
        let record = decode(
            &compact(&["2", "0", "1", "0", "4", "10"]),
            &Origin::Local,
            &Registry::new(),
        )
        .unwrap();
        assert_eq!(record.field("type"), Some(""));
        assert!(record.diagnostics.is_empty());
    }

    #[test]
    fn test_short_app_layout_uses_proc_id() {
        let mut registry = Registry::new();
        registry.upsert_app_knob(
            42,
            Knob::new(
                1,
                AppKnobType::Prec,
                Numeric::Int(0),
                Numeric::Int(8),
                Numeric::Int(4),
            ),
        );
        let record = decode(&compact(&["6", "1", "42", "5"]), &Origin::Local, &registry).unwrap();
        assert_eq!(
            record.render(),
            "source:UDS,api:PRIME_API_APP_KNOB_DISC_GET,ts:5,id:1,proc_id:42,type:PRIME_PREC,"
        );
    }

    #[test]
    fn test_registry_miss_yields_sentinel() {
        let origin = Origin::Remote("10.0.0.2".to_string());
        let record = decode(
            &compact(&["i", "7", "55", "3", "1"]),
            &origin,
            &registry_with_freq_knob(),
        )
        .unwrap();
        assert_eq!(record.field("type"), Some(prime_registry::UNKNOWN_TYPE));
        assert_eq!(record.field("proc_id"), Some("3"));
        assert!(matches!(
            record.diagnostics.as_slice(),
            [DecodeError::UnknownTypeReference { .. }]
        ));
    }

    #[test]
    fn test_bare_layout() {
        let record = decode(&compact(&["k", "2", "77"]), &Origin::Local, &Registry::new()).unwrap();
        assert_eq!(
            record.render(),
            "source:UDS,api:PRIME_API_DEV_RETURN_MON_DISC_GET,ts:77,id:2,"
        );
    }

    #[test]
    fn test_bad_arity_is_malformed() {
        let err = decode(&compact(&["g", "1"]), &Origin::Local, &Registry::new()).unwrap_err();
        assert!(matches!(err, DecodeError::MalformedMessage { .. }));
        let err = decode("hello world", &Origin::Local, &Registry::new()).unwrap_err();
        assert!(matches!(err, DecodeError::MalformedMessage { .. }));
    }

    #[test]
    fn test_unknown_opcode() {
        let err = decode(&compact(&["z", "1", "2", "3"]), &Origin::Local, &Registry::new()).unwrap_err();
        assert!(matches!(err, DecodeError::UnknownOpcode { ref opcode, .. } if opcode == "z"));
    }

    #[test]
    fn test_non_integer_ids_are_malformed() {
        let registry = Registry::new();
        assert!(decode(&compact(&["g", "x", "1", "2"]), &Origin::Local, &registry).is_err());
        assert!(decode(&compact(&["6", "1", "pid", "2"]), &Origin::Local, &registry).is_err());
        // device short layout carries a value, not a proc_id
        assert!(decode(&compact(&["g", "1", "fast", "2"]), &Origin::Local, &registry).is_ok());
    }
}
