// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Message type table
//!
//! Maps every self-describing type tag to its [`Schema`]. Built once on first
//! use and shared read-only afterwards.

use std::collections::HashMap;
use std::sync::OnceLock;

use prime_registry::ValueClass::{self, Continuous, Discrete};

use crate::schema::{Effect, Field, FieldKind, FilterTarget, Schema};

/// Prefix that may be omitted from API type tags on the wire
pub const API_PREFIX: &str = "PRIME_API_";

const INT: FieldKind = FieldKind::Int;
const FLOAT: FieldKind = FieldKind::Float;
const TEXT: FieldKind = FieldKind::Text;

/// Lookup table from type tag to schema
#[derive(Debug)]
pub struct Catalog {
    schemas: HashMap<&'static str, Schema>,
}

impl Catalog {
    /// The shared protocol catalog
    pub fn global() -> &'static Catalog {
        static CATALOG: OnceLock<Catalog> = OnceLock::new();
        CATALOG.get_or_init(Catalog::build)
    }

    /// Look up a tag, retrying with the `PRIME_API_` prefix for short tags
    pub fn get(&self, tag: &str) -> Option<&Schema> {
        self.schemas.get(tag).or_else(|| {
            if tag.starts_with("PRIME_") {
                None
            } else {
                self.schemas.get(format!("{}{}", API_PREFIX, tag).as_str())
            }
        })
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    pub fn tags(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.schemas.keys().copied()
    }

    fn insert(&mut self, schema: Schema) {
        self.schemas.insert(schema.tag, schema);
    }

    /// Insert the DISC and CONT variants of a message type
    fn classed(
        &mut self,
        disc: &'static str,
        cont: &'static str,
        build: impl Fn(&'static str, ValueClass) -> Schema,
    ) {
        self.insert(build(disc, Discrete));
        self.insert(build(cont, Continuous));
    }

    fn empty(&mut self, tags: &[&'static str]) {
        for &tag in tags {
            self.insert(Schema::new(tag));
        }
    }

    fn build() -> Self {
        let mut catalog = Catalog {
            schemas: HashMap::new(),
        };
        catalog.device_to_rtm();
        catalog.device_log();
        catalog.device_ui();
        catalog.rtm_to_device();
        catalog.rtm_to_app();
        catalog.rtm_ui();
        catalog.app_to_rtm();
        catalog.app_ui();
        catalog.ui();
        catalog
    }

    fn device_to_rtm(&mut self) {
        for tag in [
            "PRIME_API_DEV_RETURN_KNOB_DISC_SIZE",
            "PRIME_API_DEV_RETURN_KNOB_CONT_SIZE",
            "PRIME_API_DEV_RETURN_MON_DISC_SIZE",
            "PRIME_API_DEV_RETURN_MON_CONT_SIZE",
        ] {
            self.insert(Schema::new(tag).fields(vec![Field::show("size", &["data"], INT)]));
        }

        self.classed(
            "PRIME_API_DEV_RETURN_KNOB_DISC_REG",
            "PRIME_API_DEV_RETURN_KNOB_CONT_REG",
            |tag, class| {
                let n = FieldKind::number(class);
                Schema::new(tag)
                    .list(
                        &["data"],
                        vec![
                            Field::show("id", &["id"], INT),
                            Field::show("type", &["type"], FieldKind::DevKnobType),
                            Field::show("min", &["min"], n),
                            Field::show("max", &["max"], n),
                            Field::show("init", &["init"], n),
                        ],
                    )
                    .effect(Effect::UpsertDeviceKnob)
            },
        );

        self.classed(
            "PRIME_API_DEV_RETURN_MON_DISC_REG",
            "PRIME_API_DEV_RETURN_MON_CONT_REG",
            |tag, _| {
                Schema::new(tag)
                    .list(&["data"], device_monitor_ref())
                    .effect(Effect::UpsertDeviceMonitor)
            },
        );

        self.classed(
            "PRIME_API_DEV_RETURN_MON_DISC_GET",
            "PRIME_API_DEV_RETURN_MON_CONT_GET",
            |tag, class| {
                Schema::new(tag).fields(vec![Field::show(
                    "val",
                    &["data"],
                    FieldKind::number(class),
                )])
            },
        );

        self.insert(
            Schema::new("PRIME_API_DEV_RETURN_ARCH_GET")
                .fields(vec![Field::show("file", &["data"], TEXT)]),
        );
    }

    fn device_log(&mut self) {
        self.classed(
            "PRIME_LOG_DEV_MON_DISC",
            "PRIME_LOG_DEV_MON_CONT",
            |tag, class| {
                Schema::new(tag).fields(vec![
                    Field::show("id", &["data", "id"], INT),
                    Field::show("type", &["data", "type"], FieldKind::DevMonType),
                    Field::show("val", &["data", "val"], FieldKind::number(class)),
                ])
            },
        );

        self.classed(
            "PRIME_LOG_DEV_KNOB_DISC",
            "PRIME_LOG_DEV_KNOB_CONT",
            |tag, class| {
                let n = FieldKind::number(class);
                Schema::new(tag).fields(vec![
                    Field::show("id", &["data", "id"], INT),
                    Field::show("type", &["data", "type"], FieldKind::DevKnobType),
                    Field::show("min", &["data", "min"], n),
                    Field::show("max", &["data", "max"], n),
                    Field::show("val", &["data", "val"], n),
                ])
            },
        );
    }

    fn device_ui(&mut self) {
        self.empty(&["PRIME_UI_DEV_STOP"]);
        self.insert(Schema::new("PRIME_UI_DEV_RETURN_DEV_START").effect(Effect::CreateDevice));
        self.insert(Schema::new("PRIME_UI_DEV_RETURN_DEV_STOP").effect(Effect::DropDevice));
        self.insert(
            Schema::new("PRIME_UI_DEV_ERROR").fields(vec![Field::show(
                "msg",
                &["data", "msg"],
                TEXT,
            )]),
        );
    }

    fn rtm_to_device(&mut self) {
        self.empty(&[
            "PRIME_API_DEV_KNOB_DISC_SIZE",
            "PRIME_API_DEV_KNOB_CONT_SIZE",
            "PRIME_API_DEV_KNOB_DISC_REG",
            "PRIME_API_DEV_KNOB_CONT_REG",
            "PRIME_API_DEV_MON_DISC_SIZE",
            "PRIME_API_DEV_MON_CONT_SIZE",
            "PRIME_API_DEV_MON_DISC_REG",
            "PRIME_API_DEV_MON_CONT_REG",
            "PRIME_API_DEV_ARCH_GET",
        ]);

        self.classed(
            "PRIME_API_DEV_KNOB_DISC_SET",
            "PRIME_API_DEV_KNOB_CONT_SET",
            |tag, class| {
                let n = FieldKind::number(class);
                Schema::new(tag).fields(vec![
                    Field::show("id", &["data", "knob", "id"], INT),
                    Field::show("type", &["data", "knob", "type"], FieldKind::DevKnobType),
                    Field::show("min", &["data", "knob", "min"], n),
                    Field::show("max", &["data", "knob", "max"], n),
                    Field::show("val", &["data", "knob", "val"], n),
                    Field::show("init", &["data", "knob", "init"], n),
                    Field::show("val_set", &["data", "val"], n),
                ])
            },
        );

        self.classed(
            "PRIME_API_DEV_KNOB_DISC_DEREG",
            "PRIME_API_DEV_KNOB_CONT_DEREG",
            |tag, _| {
                Schema::new(tag)
                    .list(
                        &["data", "knobs"],
                        vec![
                            Field::show("id", &["id"], INT),
                            Field::show("type", &["type"], FieldKind::DevKnobType),
                        ],
                    )
                    .effect(Effect::RemoveDeviceKnob)
            },
        );

        self.classed(
            "PRIME_API_DEV_MON_DISC_GET",
            "PRIME_API_DEV_MON_CONT_GET",
            |tag, class| {
                Schema::new(tag).fields(vec![
                    Field::show("id", &["data", "mon", "id"], INT),
                    Field::show("type", &["data", "mon", "type"], FieldKind::DevMonType),
                    Field::show("val", &["data", "mon", "val"], FieldKind::number(class)),
                ])
            },
        );

        self.classed(
            "PRIME_API_DEV_MON_DISC_DEREG",
            "PRIME_API_DEV_MON_CONT_DEREG",
            |tag, _| {
                Schema::new(tag)
                    .list(&["data", "mons"], device_monitor_ref())
                    .effect(Effect::RemoveDeviceMonitor)
            },
        );
    }

    fn rtm_to_app(&mut self) {
        for tag in [
            "PRIME_API_APP_RETURN_APP_REG",
            "PRIME_API_APP_RETURN_APP_DEREG",
        ] {
            self.insert(Schema::new(tag).fields(vec![proc_id()]));
        }

        self.classed(
            "PRIME_API_APP_RETURN_KNOB_DISC_GET",
            "PRIME_API_APP_RETURN_KNOB_CONT_GET",
            |tag, class| {
                Schema::new(tag).fields(vec![Field::show(
                    "val",
                    &["data"],
                    FieldKind::number(class),
                )])
            },
        );

        self.classed(
            "PRIME_API_APP_RETURN_KNOB_DISC_REG",
            "PRIME_API_APP_RETURN_KNOB_CONT_REG",
            |tag, class| {
                Schema::new(tag)
                    .fields(app_knob_ref(class, &["proc_id", "id", "type", "min", "max", "val"]))
                    .effect(Effect::UpsertAppKnob)
            },
        );

        self.classed(
            "PRIME_API_APP_RETURN_MON_DISC_REG",
            "PRIME_API_APP_RETURN_MON_CONT_REG",
            |tag, class| {
                Schema::new(tag)
                    .fields(app_monitor_ref(
                        class,
                        &["proc_id", "id", "type", "min", "max", "val", "weight"],
                    ))
                    .effect(Effect::UpsertAppMonitor)
            },
        );
    }

    fn rtm_ui(&mut self) {
        self.empty(&[
            "PRIME_UI_RTM_DEV_DEREG",
            "PRIME_UI_RTM_STOP",
            "PRIME_UI_RTM_RETURN_RTM_STOP",
        ]);
        self.insert(
            Schema::new("PRIME_UI_RTM_ERROR").fields(vec![Field::show(
                "msg",
                &["data", "msg"],
                TEXT,
            )]),
        );
    }

    fn app_to_rtm(&mut self) {
        self.insert(
            Schema::new("PRIME_API_APP_REG")
                .fields(vec![proc_id()])
                .effect(Effect::CreateApp)
                .attributed(Field::show("ur_id", &["data", "ur_id"], INT)),
        );
        self.insert(
            Schema::new("PRIME_API_APP_DEREG")
                .fields(vec![proc_id()])
                .effect(Effect::DropApp),
        );

        self.classed(
            "PRIME_API_APP_KNOB_DISC_REG",
            "PRIME_API_APP_KNOB_CONT_REG",
            |tag, class| {
                let n = FieldKind::number(class);
                Schema::new(tag).fields(vec![
                    proc_id(),
                    Field::show("type", &["data", "type"], FieldKind::AppKnobType),
                    Field::show("min", &["data", "min"], n),
                    Field::show("max", &["data", "max"], n),
                    Field::show("val", &["data", "val"], n),
                ])
            },
        );

        self.classed(
            "PRIME_API_APP_KNOB_DISC_MIN",
            "PRIME_API_APP_KNOB_CONT_MIN",
            |tag, class| {
                let mut fields = app_knob_ref(class, &["proc_id", "id", "type", "min"]);
                fields.push(Field::show("min_set", &["data", "min"], FieldKind::number(class)));
                Schema::new(tag).fields(fields)
            },
        );

        self.classed(
            "PRIME_API_APP_KNOB_DISC_MAX",
            "PRIME_API_APP_KNOB_CONT_MAX",
            |tag, class| {
                let mut fields = app_knob_ref(class, &["proc_id", "id", "type", "max"]);
                fields.push(Field::show("max_set", &["data", "max"], FieldKind::number(class)));
                Schema::new(tag).fields(fields)
            },
        );

        self.classed(
            "PRIME_API_APP_KNOB_DISC_GET",
            "PRIME_API_APP_KNOB_CONT_GET",
            |tag, class| {
                Schema::new(tag).fields(app_knob_ref(class, &["proc_id", "id", "type", "val"]))
            },
        );

        self.classed(
            "PRIME_API_APP_KNOB_DISC_DEREG",
            "PRIME_API_APP_KNOB_CONT_DEREG",
            |tag, class| {
                Schema::new(tag)
                    .fields(app_knob_ref(class, &["proc_id", "id", "type"]))
                    .effect(Effect::RemoveAppKnob)
            },
        );

        self.classed(
            "PRIME_API_APP_MON_DISC_REG",
            "PRIME_API_APP_MON_CONT_REG",
            |tag, class| {
                let n = FieldKind::number(class);
                Schema::new(tag).fields(vec![
                    proc_id(),
                    Field::show("type", &["data", "type"], FieldKind::AppMonType),
                    Field::show("min", &["data", "min"], n),
                    Field::show("max", &["data", "max"], n),
                    Field::show("weight", &["data", "weight"], FLOAT),
                ])
            },
        );

        for (disc, cont, key, set_key, path) in [
            (
                "PRIME_API_APP_MON_DISC_MIN",
                "PRIME_API_APP_MON_CONT_MIN",
                "min",
                "min_set",
                &["data", "min"],
            ),
            (
                "PRIME_API_APP_MON_DISC_MAX",
                "PRIME_API_APP_MON_CONT_MAX",
                "max",
                "max_set",
                &["data", "max"],
            ),
            (
                "PRIME_API_APP_MON_DISC_WEIGHT",
                "PRIME_API_APP_MON_CONT_WEIGHT",
                "weight",
                "weight_set",
                &["data", "weight"],
            ),
        ] {
            self.classed(disc, cont, |tag, class| {
                let kind = if key == "weight" {
                    FLOAT
                } else {
                    FieldKind::number(class)
                };
                let mut fields = app_monitor_ref(class, &["proc_id", "id", "type", key]);
                fields.push(Field::show(set_key, path, kind));
                Schema::new(tag).fields(fields)
            });
        }

        self.classed(
            "PRIME_API_APP_MON_DISC_SET",
            "PRIME_API_APP_MON_CONT_SET",
            |tag, class| {
                let mut fields = app_monitor_ref(class, &["proc_id", "id", "type", "val"]);
                fields.push(Field::show("val_set", &["data", "val"], FieldKind::number(class)));
                Schema::new(tag).fields(fields)
            },
        );

        self.classed(
            "PRIME_API_APP_MON_DISC_DEREG",
            "PRIME_API_APP_MON_CONT_DEREG",
            |tag, class| {
                Schema::new(tag)
                    .fields(app_monitor_ref(class, &["proc_id", "id", "type"]))
                    .effect(Effect::RemoveAppMonitor)
            },
        );
    }

    fn app_ui(&mut self) {
        self.insert(
            Schema::new("PRIME_UI_APP_RETURN_APP_START")
                .fields(vec![proc_id()])
                .effect(Effect::CreateApp),
        );
        self.insert(
            Schema::new("PRIME_UI_APP_RETURN_APP_STOP")
                .fields(vec![proc_id()])
                .effect(Effect::DropApp),
        );
        self.insert(Schema::new("PRIME_UI_APP_ERROR").fields(vec![
            proc_id(),
            Field::show("msg", &["data", "msg"], TEXT),
        ]));
    }

    fn ui(&mut self) {
        self.insert(
            Schema::new("PRIME_UI_APP_START").fields(vec![Field::show("name", &["name"], TEXT)]),
        );
        for tag in ["PRIME_UI_APP_STOP", "PRIME_UI_APP_REG", "PRIME_UI_APP_DEREG"] {
            self.insert(Schema::new(tag).fields(vec![proc_id()]));
        }

        for (disc, cont, key, path) in [
            (
                "PRIME_UI_APP_MON_DISC_MIN",
                "PRIME_UI_APP_MON_CONT_MIN",
                "min",
                &["data", "min"],
            ),
            (
                "PRIME_UI_APP_MON_DISC_MAX",
                "PRIME_UI_APP_MON_CONT_MAX",
                "max",
                &["data", "max"],
            ),
            (
                "PRIME_UI_APP_MON_DISC_WEIGHT",
                "PRIME_UI_APP_MON_CONT_WEIGHT",
                "weight",
                &["data", "weight"],
            ),
        ] {
            self.classed(disc, cont, |tag, class| {
                let kind = if key == "weight" {
                    FLOAT
                } else {
                    FieldKind::number(class)
                };
                Schema::new(tag).fields(vec![
                    Field::show("mon_id", &["data", "id"], INT),
                    Field::show(key, path, kind),
                ])
            });
        }

        self.insert(Schema::new("PRIME_UI_APP_WEIGHT").fields(vec![
            proc_id(),
            Field::show("weight", &["data", "weight"], FLOAT),
        ]));

        self.insert(Schema::new("PRIME_UI_RTM_POLICY_SWITCH").fields(vec![
            Field::show("policy", &["data", "policy"], TEXT),
            Field::show("params", &["data", "params"], FieldKind::Json),
        ]));

        for (tag, target) in [
            ("PRIME_UI_LOG_FILE_FILTER_MUX", FilterTarget::File),
            ("PRIME_UI_LOG_VISUAL_FILTER_MUX", FilterTarget::Visual),
            ("PRIME_UI_VISUAL_FILTER_MUX", FilterTarget::Visual),
        ] {
            self.insert(
                Schema::new(tag)
                    .fields(vec![Field::show(
                        "messages",
                        &["data", "messages"],
                        FieldKind::Json,
                    )])
                    .effect(Effect::SetFilter(target)),
            );
        }
    }
}

fn proc_id() -> Field {
    Field::show("proc_id", &["data", "proc_id"], INT)
}

fn device_monitor_ref() -> Vec<Field> {
    vec![
        Field::show("id", &["id"], INT),
        Field::show("type", &["type"], FieldKind::DevMonType),
    ]
}

/// Fields of an embedded `data.knob` object; only keys in `shown` are rendered
fn app_knob_ref(class: ValueClass, shown: &[&str]) -> Vec<Field> {
    let n = FieldKind::number(class);
    select(
        vec![
            Field::show("proc_id", &["data", "knob", "proc_id"], INT),
            Field::show("id", &["data", "knob", "id"], INT),
            Field::show("type", &["data", "knob", "type"], FieldKind::AppKnobType),
            Field::show("min", &["data", "knob", "min"], n),
            Field::show("max", &["data", "knob", "max"], n),
            Field::show("val", &["data", "knob", "val"], n),
        ],
        shown,
    )
}

/// Fields of an embedded `data.mon` object; only keys in `shown` are rendered
fn app_monitor_ref(class: ValueClass, shown: &[&str]) -> Vec<Field> {
    let n = FieldKind::number(class);
    select(
        vec![
            Field::show("proc_id", &["data", "mon", "proc_id"], INT),
            Field::show("id", &["data", "mon", "id"], INT),
            Field::show("type", &["data", "mon", "type"], FieldKind::AppMonType),
            Field::show("min", &["data", "mon", "min"], n),
            Field::show("max", &["data", "mon", "max"], n),
            Field::show("val", &["data", "mon", "val"], n),
            Field::show("weight", &["data", "mon", "weight"], FLOAT),
        ],
        shown,
    )
}

fn select(fields: Vec<Field>, shown: &[&str]) -> Vec<Field> {
    fields
        .into_iter()
        .map(|field| Field {
            shown: shown.contains(&field.key),
            ..field
        })
        .collect()
}
