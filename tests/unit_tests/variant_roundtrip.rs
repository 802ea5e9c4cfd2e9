// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Descriptor/value round-tripping across composite kinds, plus the
//! `additional`-bag passthrough for out-of-band metadata like `unit`.

use secop_rs::variant::{
    compare::{CompareResult, compare_type, compare_value},
    descriptor::{create_from_descriptor, export_type},
    value::{export_value, import_value},
};
use serde_json::json;

#[test]
fn struct_preserves_declaration_order_through_export_type() {
    let descriptor = json!({
        "type": "struct",
        "members": {"x": {"type": "double"}, "y": {"type": "double"}, "z": {"type": "double"}},
    });
    let v = create_from_descriptor(&descriptor).unwrap();
    let exported = export_type(&v);
    let keys: Vec<&String> = exported["members"].as_object().unwrap().keys().collect();
    assert_eq!(keys, vec!["x", "y", "z"]);
}

#[test]
fn struct_value_import_export_round_trips() {
    let descriptor = json!({
        "type": "struct",
        "members": {"x": {"type": "double"}, "label": {"type": "string"}},
    });
    let mut v = create_from_descriptor(&descriptor).unwrap();
    let value = json!({"x": 3.5, "label": "probe"});
    import_value(&mut v, &value, true).unwrap();
    assert_eq!(export_value(&v), value);
}

#[test]
fn tuple_value_import_export_round_trips() {
    let descriptor = json!({"type": "tuple", "members": [{"type": "double"}, {"type": "bool"}]});
    let mut v = create_from_descriptor(&descriptor).unwrap();
    let value = json!([1.0, true]);
    import_value(&mut v, &value, true).unwrap();
    assert_eq!(export_value(&v), value);
}

#[test]
fn additional_metadata_survives_descriptor_round_trip() {
    let descriptor = json!({"type": "double", "unit": "K", "min": 0.0, "max": 500.0});
    let v = create_from_descriptor(&descriptor).unwrap();
    assert_eq!(v.additional.get("unit"), Some(&json!("K")));
    assert_eq!(export_type(&v), descriptor);
}

#[test]
fn compare_type_requires_identical_bounds() {
    let narrow = create_from_descriptor(&json!({"type": "double", "min": 0.0, "max": 10.0})).unwrap();
    let wide = create_from_descriptor(&json!({"type": "double", "min": -10.0, "max": 20.0})).unwrap();
    assert!(!compare_type(&narrow, &wide));
    assert_eq!(compare_value(&narrow, &wide), CompareResult::DiffType);
}

#[test]
fn compare_value_rejects_kind_mismatch_as_diff_type() {
    let mut d = create_from_descriptor(&json!({"type": "double"})).unwrap();
    import_value(&mut d, &json!(5.0), true).unwrap();
    let mut i = create_from_descriptor(&json!({"type": "int"})).unwrap();
    import_value(&mut i, &json!(5), true).unwrap();
    assert_eq!(compare_value(&d, &i), CompareResult::DiffType);
}
