// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Every catalog entry decodes a payload built from its own field table

use prime_protocol::schema::{Body, Field, FieldKind};
use prime_protocol::{Catalog, Decoder, Origin, RecordBody, MISSING_FIELD_MARKER};
use prime_registry::UNKNOWN_TYPE;
use serde_json::{json, Map, Value};

fn sample(kind: FieldKind) -> Value {
    match kind {
        FieldKind::Int => json!(1),
        FieldKind::Float => json!(1.5),
        FieldKind::Text => json!("x"),
        FieldKind::Json => json!(["PRIME_API_APP_REG"]),
        FieldKind::AppKnobType
        | FieldKind::AppMonType
        | FieldKind::DevKnobType
        | FieldKind::DevMonType => json!(0),
    }
}

fn expected_text(kind: FieldKind) -> Option<&'static str> {
    match kind {
        FieldKind::Int => Some("1"),
        FieldKind::Float => Some("1.5"),
        FieldKind::Text => Some("x"),
        FieldKind::Json => Some(r#"["PRIME_API_APP_REG"]"#),
        _ => None,
    }
}

fn set_path(root: &mut Value, path: &[&str], value: Value) {
    let (last, parents) = path.split_last().expect("field path is never empty");
    let mut node = root;
    for segment in parents {
        node = node
            .as_object_mut()
            .unwrap_or_else(|| panic!("'{}' sits under a non-object", segment))
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    node.as_object_mut()
        .unwrap_or_else(|| panic!("'{}' sits under a non-object", last))
        .insert(last.to_string(), value);
}

fn remove_path(root: &mut Value, path: &[&str]) {
    let (last, parents) = path.split_last().expect("field path is never empty");
    let parent = parents
        .iter()
        .try_fold(root, |node, segment| node.get_mut(*segment))
        .and_then(Value::as_object_mut)
        .expect("parent of a synthesized field exists");
    parent.remove(*last);
}

fn fill(fields: &[Field]) -> Value {
    let mut element = json!({});
    for field in fields {
        set_path(&mut element, field.path, sample(field.kind));
    }
    element
}

fn message(tag: &str, body: &Body) -> Value {
    let mut msg = json!({ "type": tag, "ts": 77 });
    match body {
        Body::Empty => {}
        Body::Fields(fields) => {
            for field in fields {
                set_path(&mut msg, field.path, sample(field.kind));
            }
        }
        Body::List { list, item } => set_path(&mut msg, list, json!([fill(item)])),
    }
    msg
}

fn decode(msg: &Value) -> prime_protocol::Record {
    let mut decoder = Decoder::default();
    decoder
        .decode(msg.to_string().as_bytes(), &Origin::Local)
        .unwrap_or_else(|err| panic!("{} failed to decode: {}", msg, err))
}

fn shown(fields: &[Field]) -> Vec<&'static str> {
    fields.iter().filter(|f| f.shown).map(|f| f.key).collect()
}

#[test]
fn test_every_tag_renders_its_shown_fields_in_order() {
    let catalog = Catalog::global();
    let mut checked = 0;

    for tag in catalog.tags() {
        let schema = catalog.get(tag).unwrap();
        let (expected, fields): (Vec<&str>, &[Field]) = match &schema.body {
            Body::Empty => (Vec::new(), &[]),
            Body::Fields(fields) => (shown(fields), fields),
            Body::List { item, .. } => (shown(item), item),
        };

        let record = decode(&message(tag, &schema.body));
        assert_eq!(record.api, tag);
        assert!(record.diagnostics.is_empty(), "{}: {:?}", tag, record.diagnostics);

        let RecordBody::Fields(rendered) = &record.body else {
            panic!("{} rendered the missing-field marker", tag);
        };
        let keys: Vec<&str> = rendered.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, expected, "{}", tag);

        for field in fields.iter().filter(|f| f.shown) {
            let value = record.field(field.key).unwrap();
            match expected_text(field.kind) {
                Some(text) => assert_eq!(value, text, "{}.{}", tag, field.key),
                None => assert_ne!(value, UNKNOWN_TYPE, "{}.{}", tag, field.key),
            }
        }
        checked += 1;
    }

    assert_eq!(checked, catalog.len());
}

#[test]
fn test_dropping_any_required_field_marks_record_missing() {
    let catalog = Catalog::global();

    for tag in catalog.tags() {
        let schema = catalog.get(tag).unwrap();
        let Body::Fields(fields) = &schema.body else {
            continue;
        };

        for field in fields {
            let mut msg = message(tag, &schema.body);
            remove_path(&mut msg, field.path);

            let record = decode(&msg);
            assert!(
                record.is_missing_field(),
                "{} without {} still rendered fields",
                tag,
                field.dotted_path()
            );
            assert!(record.render().ends_with(MISSING_FIELD_MARKER), "{}", tag);
        }
    }
}

#[test]
fn test_list_tags_skip_incomplete_elements() {
    let catalog = Catalog::global();

    for tag in catalog.tags() {
        let schema = catalog.get(tag).unwrap();
        let Body::List { list, item } = &schema.body else {
            continue;
        };

        for field in item {
            let mut element = fill(item);
            remove_path(&mut element, field.path);
            let mut msg = json!({ "type": tag, "ts": 77 });
            set_path(&mut msg, list, json!([element, fill(item)]));

            let record = decode(&msg);
            assert_eq!(record.diagnostics.len(), 1, "{}", tag);
            let RecordBody::Fields(rendered) = &record.body else {
                panic!("{} marked a list body missing", tag);
            };
            assert_eq!(rendered.len(), shown(item).len(), "{}", tag);
        }

        let record = decode(&json!({ "type": tag, "ts": 77 }));
        assert!(record.is_missing_field(), "{} without its list", tag);
    }
}
