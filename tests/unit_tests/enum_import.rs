// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Enum descriptor round-tripping and import strictness, exercised through
//! the public `variant` surface rather than `descriptor`'s own inline tests.

use secop_rs::variant::{
    descriptor::{create_from_descriptor, export_type},
    value::{export_value, import_value},
};
use serde_json::json;

#[test]
fn enum_descriptor_round_trips_through_export_type() {
    let descriptor = json!({"type": "enum", "members": {"idle": 0, "busy": 1, "error": -1}});
    let v = create_from_descriptor(&descriptor).unwrap();
    let exported = export_type(&v);
    assert_eq!(exported["type"], json!("enum"));
    assert_eq!(exported["members"]["idle"], json!(0));
    assert_eq!(exported["members"]["busy"], json!(1));
    assert_eq!(exported["members"]["error"], json!(-1));
}

#[test]
fn enum_rejects_undeclared_integer_even_non_strict() {
    let mut v = create_from_descriptor(&json!({"type": "enum", "members": {"off": 0, "on": 1}})).unwrap();
    // Integer members are always validated against the declared set,
    // strict or not — only the name-vs-integer leniency differs.
    assert!(import_value(&mut v, &json!(2), false).is_err());
    assert!(import_value(&mut v, &json!(2), true).is_err());
}

#[test]
fn enum_array_imports_mixed_would_fail_but_uniform_names_succeed_non_strict() {
    let descriptor = json!({
        "type": "array",
        "members": {"type": "enum", "members": {"off": 0, "on": 1}},
        "minlen": 0,
        "maxlen": 4,
    });
    let mut v = create_from_descriptor(&descriptor).unwrap();
    import_value(&mut v, &json!(["off", "on", "on"]), false).unwrap();
    assert_eq!(export_value(&v), json!([0, 1, 1]));
}
