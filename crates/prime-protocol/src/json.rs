// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Self-describing (JSON) message decoding

use prime_registry::{AppKnobType, AppMonType, DevKnobType, DevMonType, Knob, Monitor, ProcId, Registry};
use serde_json::Value as Json;
use tracing::{debug, warn};

use crate::catalog::Catalog;
use crate::error::{DecodeError, Result};
use crate::record::{Origin, Record, SinkControl};
use crate::schema::{lookup, Body, Effect, FieldError, Values};

/// Decode one JSON object into a record, applying registry effects
///
/// A missing `type` or `ts` drops the message. A missing schema field
/// replaces the field section with the missing-field marker and skips the
/// registry effect.
pub(crate) fn decode_object(
    msg: &Json,
    origin: &Origin,
    attribution_board: Option<&str>,
    registry: &mut Registry,
) -> Result<Record> {
    let tag = match msg.get("type") {
        Some(Json::String(tag)) => tag.as_str(),
        Some(_) => {
            return Err(DecodeError::InvalidFieldValue {
                message_type: "message".to_string(),
                field: "type".to_string(),
                expected: "string",
            })
        }
        None => return Err(DecodeError::missing("message", "type")),
    };

    let ts = match msg.get("ts") {
        Some(raw) => render_timestamp(raw).ok_or_else(|| DecodeError::InvalidFieldValue {
            message_type: tag.to_string(),
            field: "ts".to_string(),
            expected: "timestamp",
        })?,
        None => return Err(DecodeError::missing(tag, "ts")),
    };

    let mut record = Record::new(origin, tag, ts);

    let Some(schema) = Catalog::global().get(tag) else {
        warn!("[DECODER] Unknown message type '{}' from {}", tag, origin);
        return Ok(record);
    };

    match &schema.body {
        Body::Empty => apply_effect(schema.effect, &Values::default(), origin, registry, &mut record),
        Body::Fields(fields) => match Values::extract(fields, msg) {
            Ok(values) => {
                render_values(&values, &mut record);
                if let Some(field) = &schema.attributed {
                    if attribution_board == Some(origin.label()) && origin.is_remote() {
                        match Values::extract(std::slice::from_ref(field), msg) {
                            Ok(extra) => render_values(&extra, &mut record),
                            Err(err) => record.diagnostics.push(field_error(tag, err)),
                        }
                    }
                }
                apply_effect(schema.effect, &values, origin, registry, &mut record);
            }
            Err(err) => record.mark_missing(field_error(tag, err)),
        },
        Body::List { list, item } => match lookup(msg, list) {
            Some(Json::Array(elements)) => {
                for element in elements {
                    match Values::extract(item, element) {
                        Ok(values) => {
                            render_values(&values, &mut record);
                            apply_effect(schema.effect, &values, origin, registry, &mut record);
                        }
                        Err(err) => {
                            // one bad element does not spoil its siblings
                            record.diagnostics.push(field_error(tag, err));
                        }
                    }
                }
            }
            Some(_) => record.mark_missing(DecodeError::InvalidFieldValue {
                message_type: tag.to_string(),
                field: list.join("."),
                expected: "list",
            }),
            None => record.mark_missing(DecodeError::missing(tag, list.join("."))),
        },
    }

    Ok(record)
}

fn render_timestamp(raw: &Json) -> Option<String> {
    match raw {
        Json::Number(n) => Some(n.to_string()),
        Json::String(s) if s.trim().parse::<f64>().is_ok() => Some(s.trim().to_string()),
        _ => None,
    }
}

fn render_values(values: &Values, record: &mut Record) {
    for (key, value) in values.shown() {
        record.push(key, value);
    }
    let unknown: Vec<_> = values.unknown_types().collect();
    for key in unknown {
        let detail = format!("'{}' index outside the type vocabulary", key);
        record.diagnostics.push(DecodeError::UnknownTypeReference {
            message_type: record.api.clone(),
            detail,
        });
    }
}

fn field_error(tag: &str, err: FieldError) -> DecodeError {
    match err {
        FieldError::Missing(path) => DecodeError::missing(tag, path),
        FieldError::WrongKind { path, expected } => DecodeError::InvalidFieldValue {
            message_type: tag.to_string(),
            field: path,
            expected,
        },
    }
}

fn app_knob(values: &Values) -> Option<(ProcId, Knob<AppKnobType>)> {
    let knob = Knob::new(
        values.int("id")?,
        values.app_knob_type("type")?,
        values.numeric("min")?,
        values.numeric("max")?,
        values.numeric("val")?,
    );
    Some((values.int("proc_id")?, knob))
}

fn app_monitor(values: &Values) -> Option<(ProcId, Monitor<AppMonType>)> {
    let monitor = Monitor::with_bounds(
        values.int("id")?,
        values.app_monitor_type("type")?,
        values.numeric("min")?,
        values.numeric("max")?,
        values.float("weight")?,
    );
    Some((values.int("proc_id")?, monitor))
}

fn device_knob(values: &Values) -> Option<Knob<DevKnobType>> {
    Some(Knob::new(
        values.int("id")?,
        values.device_knob_type("type")?,
        values.numeric("min")?,
        values.numeric("max")?,
        values.numeric("init")?,
    ))
}

fn device_monitor(values: &Values) -> Option<Monitor<DevMonType>> {
    Some(Monitor::bare(
        values.int("id")?,
        values.device_monitor_type("type")?,
    ))
}

fn apply_effect(
    effect: Effect,
    values: &Values,
    origin: &Origin,
    registry: &mut Registry,
    record: &mut Record,
) {
    let device = origin.label();
    let applied = match effect {
        Effect::None => true,
        Effect::CreateApp => values.int("proc_id").map(|pid| registry.create_app(pid)).is_some(),
        Effect::DropApp => values.int("proc_id").map(|pid| registry.drop_app(pid)).is_some(),
        Effect::CreateDevice => {
            registry.create_device(device);
            true
        }
        Effect::DropDevice => {
            registry.drop_device(device);
            true
        }
        Effect::UpsertAppKnob => app_knob(values)
            .map(|(pid, knob)| registry.upsert_app_knob(pid, knob))
            .is_some(),
        Effect::UpsertAppMonitor => app_monitor(values)
            .map(|(pid, monitor)| registry.upsert_app_monitor(pid, monitor))
            .is_some(),
        Effect::RemoveAppKnob => values
            .int("proc_id")
            .zip(values.int("id"))
            .map(|(pid, id)| registry.remove_app_knob(pid, id))
            .is_some(),
        Effect::RemoveAppMonitor => values
            .int("proc_id")
            .zip(values.int("id"))
            .map(|(pid, id)| registry.remove_app_monitor(pid, id))
            .is_some(),
        Effect::UpsertDeviceKnob => device_knob(values)
            .map(|knob| registry.upsert_device_knob(device, knob))
            .is_some(),
        Effect::UpsertDeviceMonitor => device_monitor(values)
            .map(|monitor| registry.upsert_device_monitor(device, monitor))
            .is_some(),
        Effect::RemoveDeviceKnob => values
            .int("id")
            .map(|id| registry.remove_device_knob(device, id))
            .is_some(),
        Effect::RemoveDeviceMonitor => values
            .int("id")
            .map(|id| registry.remove_device_monitor(device, id))
            .is_some(),
        Effect::SetFilter(target) => {
            record.control = Some(SinkControl::SetFilter {
                target,
                tags: values.string_list("messages"),
            });
            true
        }
    };

    if !applied {
        debug!(
            "[DECODER] {} from {}: registry left unchanged (unresolved type)",
            record.api, origin
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prime_registry::TypeLookup;
    use serde_json::json;

    fn decode(msg: Json, registry: &mut Registry) -> Result<Record> {
        decode_object(&msg, &Origin::Local, None, registry)
    }

    #[test]
    fn test_missing_type_drops_message() {
        let mut registry = Registry::new();
        let err = decode(json!({"ts": 1}), &mut registry).unwrap_err();
        assert!(matches!(err, DecodeError::MissingRequiredField { ref field, .. } if field == "type"));
    }

    #[test]
    fn test_missing_timestamp_drops_message() {
        let mut registry = Registry::new();
        let err = decode(json!({"type": "PRIME_UI_RTM_STOP"}), &mut registry).unwrap_err();
        assert_eq!(err.to_string(), "PRIME_UI_RTM_STOP: required field 'ts' not present");
    }

    #[test]
    fn test_string_timestamp_accepted() {
        let mut registry = Registry::new();
        let record = decode(json!({"type": "PRIME_UI_RTM_STOP", "ts": "1234"}), &mut registry).unwrap();
        assert_eq!(record.render(), "source:UDS,api:PRIME_UI_RTM_STOP,ts:1234,");
    }

    #[test]
    fn test_unknown_tag_renders_header_only() {
        let mut registry = Registry::new();
        let record = decode(json!({"type": "PRIME_FUTURE_THING", "ts": 7, "data": 1}), &mut registry).unwrap();
        assert_eq!(record.render(), "source:UDS,api:PRIME_FUTURE_THING,ts:7,");
    }

    #[test]
    fn test_missing_field_skips_effect() {
        let mut registry = Registry::new();
        let record = decode(
            json!({"type": "PRIME_API_APP_RETURN_KNOB_DISC_REG", "ts": 1,
                   "data": {"knob": {"proc_id": 5, "id": 0, "type": 0, "min": 1, "max": 4}}}),
            &mut registry,
        )
        .unwrap();
        assert!(record.is_missing_field());
        assert_eq!(registry.app_count(), 0);
    }

    #[test]
    fn test_bad_list_element_is_skipped() {
        let mut registry = Registry::new();
        let record = decode(
            json!({"type": "PRIME_API_DEV_RETURN_MON_DISC_REG", "ts": 1,
                   "data": [{"id": 0, "type": 1}, {"id": 1}, {"id": 2, "type": 3}]}),
            &mut registry,
        )
        .unwrap();
        assert_eq!(
            record.render(),
            "source:UDS,api:PRIME_API_DEV_RETURN_MON_DISC_REG,ts:1,id:0,type:PRIME_TEMP,id:2,type:PRIME_PMC,"
        );
        assert_eq!(record.diagnostics.len(), 1);
        assert_eq!(registry.device("UDS").unwrap().monitor_count(), 2);
    }

    #[test]
    fn test_out_of_range_type_index_does_not_register() {
        let mut registry = Registry::new();
        let record = decode(
            json!({"type": "PRIME_API_DEV_RETURN_KNOB_DISC_REG", "ts": 1,
                   "data": [{"id": 4, "type": 42, "min": 0, "max": 1, "init": 0}]}),
            &mut registry,
        )
        .unwrap();
        assert_eq!(record.field("type"), Some(prime_registry::UNKNOWN_TYPE));
        assert!(matches!(
            record.diagnostics[0],
            DecodeError::UnknownTypeReference { .. }
        ));
        assert_eq!(
            registry.lookup_device_knob_type("UDS", 4),
            TypeLookup::Unknown
        );
    }

    #[test]
    fn test_attribution_only_from_board() {
        let mut registry = Registry::new();
        let msg = json!({"type": "PRIME_API_APP_REG", "ts": 3, "data": {"proc_id": 8, "ur_id": 2}});
        let board = Origin::Remote("10.1.1.3".to_string());
        let other = Origin::Remote("10.1.1.4".to_string());

        let from_board = decode_object(&msg, &board, Some("10.1.1.3"), &mut registry).unwrap();
        let from_other = decode_object(&msg, &other, Some("10.1.1.3"), &mut registry).unwrap();

        assert_eq!(from_board.field("ur_id"), Some("2"));
        assert_eq!(from_other.field("ur_id"), None);
    }

    #[test]
    fn test_filter_mux_sets_control() {
        let mut registry = Registry::new();
        let record = decode(
            json!({"type": "PRIME_UI_LOG_VISUAL_FILTER_MUX", "ts": 2,
                   "data": {"messages": ["PRIME_LOG_DEV_MON_CONT"]}}),
            &mut registry,
        )
        .unwrap();
        assert_eq!(
            record.control,
            Some(SinkControl::SetFilter {
                target: crate::schema::FilterTarget::Visual,
                tags: vec!["PRIME_LOG_DEV_MON_CONT".to_string()],
            })
        );
        assert_eq!(record.field("messages"), Some("[\"PRIME_LOG_DEV_MON_CONT\"]"));
    }
}
