// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-message-type field schemas
//!
//! A [`Schema`] lists the JSON paths a message type must carry, the kind each
//! value is coerced to, and the key it is rendered under. Values are coerced
//! once here; the JSON decoder and the registry effects only ever see typed
//! [`Value`]s.

use std::fmt;

use prime_registry::{
    format_float, AppKnobType, AppMonType, DevKnobType, DevMonType, Numeric, TypeLookup,
    ValueClass,
};
use serde_json::Value as Json;

/// How a raw JSON value is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Integer; integral floats and numeric strings are accepted, fractions truncated
    Int,
    /// Floating point; numeric strings (including `inf`) are accepted
    Float,
    Text,
    /// Any value, rendered as compact JSON
    Json,
    AppKnobType,
    AppMonType,
    DevKnobType,
    DevMonType,
}

impl FieldKind {
    /// Numeric kind implied by a discrete/continuous class
    pub fn number(class: ValueClass) -> Self {
        match class {
            ValueClass::Discrete => FieldKind::Int,
            ValueClass::Continuous => FieldKind::Float,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            FieldKind::Int => "integer",
            FieldKind::Float => "float",
            FieldKind::Text => "string",
            FieldKind::Json => "value",
            FieldKind::AppKnobType
            | FieldKind::AppMonType
            | FieldKind::DevKnobType
            | FieldKind::DevMonType => "type index",
        }
    }
}

/// One required field of a schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// Output key
    pub key: &'static str,
    /// Path from the message root (or from a list element)
    pub path: &'static [&'static str],
    pub kind: FieldKind,
    /// Hidden fields are validated but not rendered
    pub shown: bool,
}

impl Field {
    pub const fn show(key: &'static str, path: &'static [&'static str], kind: FieldKind) -> Self {
        Self {
            key,
            path,
            kind,
            shown: true,
        }
    }

    pub const fn need(key: &'static str, path: &'static [&'static str], kind: FieldKind) -> Self {
        Self {
            key,
            path,
            kind,
            shown: false,
        }
    }

    pub fn dotted_path(&self) -> String {
        self.path.join(".")
    }
}

/// Shape of a message body
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// Header only
    Empty,
    /// A fixed set of required fields; any failure replaces the body with the missing-field marker
    Fields(Vec<Field>),
    /// Every element of the list at `list` is decoded with `item`; bad elements are skipped
    List {
        list: &'static [&'static str],
        item: Vec<Field>,
    },
}

/// Which sink filter a filter-mux message replaces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterTarget {
    File,
    Visual,
}

/// Registry (or sink) side effect of a successfully decoded message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    CreateApp,
    DropApp,
    CreateDevice,
    DropDevice,
    UpsertAppKnob,
    UpsertAppMonitor,
    RemoveAppKnob,
    RemoveAppMonitor,
    UpsertDeviceKnob,
    UpsertDeviceMonitor,
    RemoveDeviceKnob,
    RemoveDeviceMonitor,
    SetFilter(FilterTarget),
}

/// Decoding rules for one message type
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub tag: &'static str,
    pub body: Body,
    pub effect: Effect,
    /// Rendered only when the message comes from the attribution board
    pub attributed: Option<Field>,
}

impl Schema {
    pub fn new(tag: &'static str) -> Self {
        Self {
            tag,
            body: Body::Empty,
            effect: Effect::None,
            attributed: None,
        }
    }

    pub fn fields(mut self, fields: Vec<Field>) -> Self {
        self.body = Body::Fields(fields);
        self
    }

    pub fn list(mut self, list: &'static [&'static str], item: Vec<Field>) -> Self {
        self.body = Body::List { list, item };
        self
    }

    pub fn effect(mut self, effect: Effect) -> Self {
        self.effect = effect;
        self
    }

    pub fn attributed(mut self, field: Field) -> Self {
        self.attributed = Some(field);
        self
    }
}

/// A coerced field value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Text(String),
    Json(Json),
    AppKnobType(TypeLookup<AppKnobType>),
    AppMonType(TypeLookup<AppMonType>),
    DevKnobType(TypeLookup<DevKnobType>),
    DevMonType(TypeLookup<DevMonType>),
}

impl Value {
    /// True for a type index that fell outside its vocabulary
    pub fn is_unknown_type(&self) -> bool {
        match self {
            Value::AppKnobType(t) => t.is_unknown(),
            Value::AppMonType(t) => t.is_unknown(),
            Value::DevKnobType(t) => t.is_unknown(),
            Value::DevMonType(t) => t.is_unknown(),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => f.write_str(&format_float(*v)),
            Value::Text(s) => f.write_str(s),
            Value::Json(j) => write!(f, "{}", j),
            Value::AppKnobType(t) => write!(f, "{}", t),
            Value::AppMonType(t) => write!(f, "{}", t),
            Value::DevKnobType(t) => write!(f, "{}", t),
            Value::DevMonType(t) => write!(f, "{}", t),
        }
    }
}

/// Why a field could not be extracted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    Missing(String),
    WrongKind { path: String, expected: &'static str },
}

/// Coerced values of one schema (or one list element), in schema order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Values {
    entries: Vec<(&'static str, Value, bool)>,
}

impl Values {
    /// Extract every field from `root`, failing on the first absent or ill-typed one
    pub fn extract(fields: &[Field], root: &Json) -> Result<Self, FieldError> {
        let mut entries = Vec::with_capacity(fields.len());
        for field in fields {
            entries.push((field.key, extract_field(field, root)?, field.shown));
        }
        Ok(Self { entries })
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _, _)| *k == key)
            .map(|(_, v, _)| v)
    }

    /// Rendered `(key, value)` pairs, hidden fields skipped
    pub fn shown(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        self.entries
            .iter()
            .filter(|(_, _, shown)| *shown)
            .map(|(k, v, _)| (*k, v))
    }

    /// Keys whose type index did not resolve
    pub fn unknown_types(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries
            .iter()
            .filter(|(_, v, _)| v.is_unknown_type())
            .map(|(k, _, _)| *k)
    }

    pub fn int(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn float(&self, key: &str) -> Option<f64> {
        match self.get(key)? {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn numeric(&self, key: &str) -> Option<Numeric> {
        match self.get(key)? {
            Value::Int(v) => Some(Numeric::Int(*v)),
            Value::Float(v) => Some(Numeric::Float(*v)),
            _ => None,
        }
    }

    pub fn app_knob_type(&self, key: &str) -> Option<AppKnobType> {
        match self.get(key)? {
            Value::AppKnobType(t) => t.known(),
            _ => None,
        }
    }

    pub fn app_monitor_type(&self, key: &str) -> Option<AppMonType> {
        match self.get(key)? {
            Value::AppMonType(t) => t.known(),
            _ => None,
        }
    }

    pub fn device_knob_type(&self, key: &str) -> Option<DevKnobType> {
        match self.get(key)? {
            Value::DevKnobType(t) => t.known(),
            _ => None,
        }
    }

    pub fn device_monitor_type(&self, key: &str) -> Option<DevMonType> {
        match self.get(key)? {
            Value::DevMonType(t) => t.known(),
            _ => None,
        }
    }

    /// String elements of a JSON list value
    pub fn string_list(&self, key: &str) -> Vec<String> {
        match self.get(key) {
            Some(Value::Json(Json::Array(items))) => items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Walk `path` from `root`
pub fn lookup<'a>(root: &'a Json, path: &[&str]) -> Option<&'a Json> {
    path.iter().try_fold(root, |node, segment| node.get(*segment))
}

fn extract_field(field: &Field, root: &Json) -> Result<Value, FieldError> {
    let raw = lookup(root, field.path).ok_or_else(|| FieldError::Missing(field.dotted_path()))?;
    coerce(raw, field.kind).ok_or_else(|| FieldError::WrongKind {
        path: field.dotted_path(),
        expected: field.kind.describe(),
    })
}

/// Coerce a raw JSON value to `kind`
///
/// Peers serialise numbers as strings, so numeric strings are accepted for
/// every numeric kind.
pub fn coerce(raw: &Json, kind: FieldKind) -> Option<Value> {
    match kind {
        FieldKind::Int => as_int(raw).map(Value::Int),
        FieldKind::Float => as_float(raw).map(Value::Float),
        FieldKind::Text => match raw {
            Json::String(s) => Some(Value::Text(s.clone())),
            Json::Number(n) => Some(Value::Text(n.to_string())),
            Json::Bool(b) => Some(Value::Text(b.to_string())),
            _ => None,
        },
        FieldKind::Json => Some(Value::Json(raw.clone())),
        FieldKind::AppKnobType => {
            as_int(raw).map(|i| Value::AppKnobType(AppKnobType::from_index(i).into()))
        }
        FieldKind::AppMonType => {
            as_int(raw).map(|i| Value::AppMonType(AppMonType::from_index(i).into()))
        }
        FieldKind::DevKnobType => {
            as_int(raw).map(|i| Value::DevKnobType(DevKnobType::from_index(i).into()))
        }
        FieldKind::DevMonType => {
            as_int(raw).map(|i| Value::DevMonType(DevMonType::from_index(i).into()))
        }
    }
}

pub fn as_int(raw: &Json) -> Option<i64> {
    match raw {
        Json::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().and_then(truncate)),
        Json::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(truncate))
        }
        _ => None,
    }
}

pub fn as_float(raw: &Json) -> Option<f64> {
    match raw {
        Json::Number(n) => n.as_f64(),
        Json::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn truncate(value: f64) -> Option<i64> {
    if value.is_finite() && value.abs() < i64::MAX as f64 {
        Some(value.trunc() as i64)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_int_coercion() {
        assert_eq!(as_int(&json!(42)), Some(42));
        assert_eq!(as_int(&json!("42")), Some(42));
        assert_eq!(as_int(&json!(" 7 ")), Some(7));
        assert_eq!(as_int(&json!(3.9)), Some(3));
        assert_eq!(as_int(&json!("abc")), None);
        assert_eq!(as_int(&json!(null)), None);
    }

    #[test]
    fn test_float_coercion() {
        assert_eq!(as_float(&json!(1.5)), Some(1.5));
        assert_eq!(as_float(&json!("0.25")), Some(0.25));
        assert_eq!(as_float(&json!(2)), Some(2.0));
        assert_eq!(as_float(&json!("inf")), Some(f64::INFINITY));
        assert_eq!(as_float(&json!([1])), None);
    }

    #[test]
    fn test_type_index_out_of_range_is_unknown() {
        let value = coerce(&json!(99), FieldKind::DevKnobType).unwrap();
        assert!(value.is_unknown_type());
        assert_eq!(value.to_string(), prime_registry::UNKNOWN_TYPE);
    }

    #[test]
    fn test_extract_reports_missing_path() {
        const FIELDS: &[Field] = &[
            Field::show("proc_id", &["data", "proc_id"], FieldKind::Int),
            Field::show("id", &["data", "id"], FieldKind::Int),
        ];
        let err = Values::extract(FIELDS, &json!({"data": {"proc_id": 1}})).unwrap_err();
        assert_eq!(err, FieldError::Missing("data.id".to_string()));
    }

    #[test]
    fn test_extract_reports_wrong_kind() {
        const FIELDS: &[Field] = &[Field::show("min", &["min"], FieldKind::Float)];
        let err = Values::extract(FIELDS, &json!({"min": {"nested": true}})).unwrap_err();
        assert_eq!(
            err,
            FieldError::WrongKind {
                path: "min".to_string(),
                expected: "float"
            }
        );
    }

    #[test]
    fn test_hidden_fields_are_not_shown() {
        const FIELDS: &[Field] = &[
            Field::show("id", &["id"], FieldKind::Int),
            Field::need("max", &["max"], FieldKind::Int),
        ];
        let values = Values::extract(FIELDS, &json!({"id": 1, "max": 9})).unwrap();
        let shown: Vec<_> = values.shown().map(|(k, _)| k).collect();
        assert_eq!(shown, vec!["id"]);
        assert_eq!(values.int("max"), Some(9));
    }

    #[test]
    fn test_string_list() {
        const FIELDS: &[Field] = &[Field::show("messages", &["messages"], FieldKind::Json)];
        let values =
            Values::extract(FIELDS, &json!({"messages": ["PRIME_API_APP_REG", 3]})).unwrap();
        assert_eq!(values.string_list("messages"), vec!["PRIME_API_APP_REG"]);
    }
}
