// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! SECoP type descriptor parsing and emission: `{"type": "...", ...}` JSON
//! on the wire in either direction of [`super::Variant`].

use serde_json::{Map, Value, json};

use super::{ArrayBounds, EnumMember, Variant, VariantError, VariantKind, error::Result};

/// Parses a SECoP type descriptor into a fresh [`Variant`] holding the
/// type's default value. Unknown keys alongside `"type"` are preserved
/// verbatim in [`Variant::additional`].
pub fn create_from_descriptor(descriptor: &Value) -> Result<Variant> {
    let obj = descriptor
        .as_object()
        .ok_or_else(|| VariantError::InvalidType("descriptor is not a JSON object".into()))?;
    let type_name = obj
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| VariantError::InvalidType("missing \"type\" key".into()))?;

    let kind = match type_name {
        "bool" => VariantKind::Bool(false),
        "int" => {
            let min = opt_i64(obj, "min")?.unwrap_or(i64::MIN);
            let max = opt_i64(obj, "max")?.unwrap_or(i64::MAX);
            check_minmax_i64(min, max)?;
            VariantKind::Int {
                value: min.max(0).min(max),
                min,
                max,
            }
        },
        "double" => {
            let min = opt_f64(obj, "min")?.unwrap_or(f64::NAN);
            let max = opt_f64(obj, "max")?.unwrap_or(f64::NAN);
            check_minmax_f64(min, max)?;
            VariantKind::Double {
                value: 0.0,
                min,
                max,
            }
        },
        "scaled" => {
            let scale = opt_f64(obj, "scale")?
                .ok_or_else(|| VariantError::InvalidType("scaled requires \"scale\"".into()))?;
            if !(scale.is_finite() && scale > 0.0) {
                return Err(VariantError::InvalidType(
                    "scaled \"scale\" must be a positive finite number".into(),
                ));
            }
            let min = opt_i64(obj, "min")?.unwrap_or(i64::MIN);
            let max = opt_i64(obj, "max")?.unwrap_or(i64::MAX);
            check_minmax_i64(min, max)?;
            VariantKind::Scaled {
                value: 0,
                scale,
                min,
                max,
            }
        },
        "enum" => {
            let members = parse_enum_members(obj)?;
            let value = members.first().map(|m| m.value).unwrap_or(0);
            VariantKind::Enum { value, members }
        },
        "string" => {
            let is_utf8 = obj
                .get("isUTF8")
                .and_then(Value::as_bool)
                .unwrap_or(true);
            let min_len = opt_u64(obj, "minchars")?.unwrap_or(0) as usize;
            let max_len = opt_u64(obj, "maxchars")?.unwrap_or(u64::MAX as u64) as usize;
            VariantKind::String {
                value: String::new(),
                is_utf8,
                bounds: ArrayBounds { min_len, max_len },
            }
        },
        "blob" => {
            let min_len = opt_u64(obj, "minbytes")?.unwrap_or(0) as usize;
            let max_len = opt_u64(obj, "maxbytes")?.unwrap_or(u64::MAX as u64) as usize;
            VariantKind::Blob {
                value: Vec::new(),
                bounds: ArrayBounds { min_len, max_len },
            }
        },
        "json" => VariantKind::Json { value: Value::Null },
        "array" => {
            let member_descriptor = obj
                .get("members")
                .ok_or_else(|| VariantError::InvalidType("array requires \"members\"".into()))?;
            let element_type = create_from_descriptor(member_descriptor)?;
            let min_len = opt_u64(obj, "minlen")?.unwrap_or(0) as usize;
            let max_len = opt_u64(obj, "maxlen")?.unwrap_or(u64::MAX as u64) as usize;
            let bounds = ArrayBounds { min_len, max_len };
            specialize_array(element_type, bounds)?
        },
        "tuple" => {
            let members = obj
                .get("members")
                .and_then(Value::as_array)
                .ok_or_else(|| VariantError::InvalidType("tuple requires \"members\"".into()))?;
            let slots = members
                .iter()
                .map(create_from_descriptor)
                .collect::<Result<Vec<_>>>()?;
            VariantKind::Tuple { slots }
        },
        "struct" => {
            let members = obj
                .get("members")
                .and_then(Value::as_object)
                .ok_or_else(|| VariantError::InvalidType("struct requires \"members\"".into()))?;
            let mut fields = Vec::with_capacity(members.len());
            for (name, member_descriptor) in members {
                fields.push((name.clone(), create_from_descriptor(member_descriptor)?));
            }
            VariantKind::Struct { fields }
        },
        "command" => {
            let argument = match obj.get("argument") {
                None | Some(Value::Null) => Variant::null(),
                Some(d) => create_from_descriptor(d)?,
            };
            let result = match obj.get("result") {
                None | Some(Value::Null) => Variant::null(),
                Some(d) => create_from_descriptor(d)?,
            };
            VariantKind::Command {
                argument: Box::new(argument),
                result: Box::new(result),
            }
        },
        other => return Err(VariantError::InvalidType(format!("unknown type \"{other}\""))),
    };

    let mut additional = Map::new();
    for (key, value) in obj {
        if !is_canonical_key(type_name, key) {
            additional.insert(key.clone(), value.clone());
        }
    }

    Ok(Variant { kind, additional })
}

/// Promotes a generic `Array` whose element type is one of the specialized
/// primitive kinds into the matching `Array*` kind, per the wire's
/// flattened array representation. Falls back to the generic `Array` kind
/// for struct/tuple/array/command/json/bool elements.
fn specialize_array(element_type: Variant, bounds: ArrayBounds) -> Result<VariantKind> {
    Ok(match element_type.kind {
        VariantKind::Bool(_) => VariantKind::ArrayBool {
            values: Vec::new(),
            bounds,
        },
        VariantKind::Double { min, max, .. } => VariantKind::ArrayDouble {
            values: Vec::new(),
            min,
            max,
            bounds,
        },
        VariantKind::Int { min, max, .. } => VariantKind::ArrayInt {
            values: Vec::new(),
            min,
            max,
            bounds,
        },
        VariantKind::Scaled { scale, min, max, .. } => VariantKind::ArrayScaled {
            values: Vec::new(),
            scale,
            min,
            max,
            bounds,
        },
        VariantKind::Enum { members, .. } => VariantKind::ArrayEnum {
            values: Vec::new(),
            members,
            bounds,
        },
        other => VariantKind::Array {
            element_type: Box::new(Variant {
                kind: other,
                additional: element_type.additional,
            }),
            elements: Vec::new(),
            bounds,
        },
    })
}

fn parse_enum_members(obj: &Map<String, Value>) -> Result<Vec<EnumMember>> {
    let members = obj
        .get("members")
        .and_then(Value::as_object)
        .ok_or_else(|| VariantError::InvalidType("enum requires \"members\"".into()))?;
    let mut out = Vec::with_capacity(members.len());
    for (name, value) in members {
        if name.is_empty() {
            return Err(VariantError::InvalidType("enum member name must not be empty".into()));
        }
        let value = value
            .as_i64()
            .ok_or_else(|| VariantError::InvalidType(format!("enum member \"{name}\" is not an integer")))?;
        if out.iter().any(|m: &EnumMember| m.value == value) {
            return Err(VariantError::InvalidType(format!(
                "enum member \"{name}\" duplicates value {value}"
            )));
        }
        out.push(EnumMember {
            name: name.clone(),
            value,
        });
    }
    if out.is_empty() {
        return Err(VariantError::InvalidType("enum has no members".into()));
    }
    Ok(out)
}

fn is_canonical_key(type_name: &str, key: &str) -> bool {
    if key == "type" {
        return true;
    }
    matches!(
        (type_name, key),
        ("int" | "scaled", "min" | "max")
            | ("double", "min" | "max")
            | ("scaled", "scale")
            | ("enum" | "array", "members")
            | ("tuple" | "struct", "members")
            | ("string", "isUTF8" | "minchars" | "maxchars")
            | ("blob", "minbytes" | "maxbytes")
            | ("array", "minlen" | "maxlen")
            | ("command", "argument" | "result")
    )
}

fn opt_i64(obj: &Map<String, Value>, key: &str) -> Result<Option<i64>> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| VariantError::InvalidType(format!("\"{key}\" is not an integer"))),
    }
}

fn opt_u64(obj: &Map<String, Value>, key: &str) -> Result<Option<u64>> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .map(Some)
            .ok_or_else(|| VariantError::InvalidType(format!("\"{key}\" is not a non-negative integer"))),
    }
}

fn opt_f64(obj: &Map<String, Value>, key: &str) -> Result<Option<f64>> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_f64()
            .map(Some)
            .ok_or_else(|| VariantError::InvalidType(format!("\"{key}\" is not a number"))),
    }
}

fn check_minmax_i64(min: i64, max: i64) -> Result<()> {
    if min > max {
        Err(VariantError::InvalidType("min must be <= max".into()))
    } else {
        Ok(())
    }
}

fn check_minmax_f64(min: f64, max: f64) -> Result<()> {
    if !min.is_nan() && !max.is_nan() && min > max {
        Err(VariantError::InvalidType("min must be <= max".into()))
    } else {
        Ok(())
    }
}

/// Canonical type descriptor of a variant's shape, the inverse of
/// [`create_from_descriptor`]. Members order for struct/tuple follows
/// declaration order.
pub fn export_type(v: &Variant) -> Value {
    let mut obj = Map::new();
    for (key, value) in &v.additional {
        obj.insert(key.clone(), value.clone());
    }

    match &v.kind {
        VariantKind::Null => {
            return Value::Null;
        },
        VariantKind::Bool(_) => {
            obj.insert("type".into(), json!("bool"));
        },
        VariantKind::Int { min, max, .. } => {
            obj.insert("type".into(), json!("int"));
            insert_i64_bound(&mut obj, "min", *min, i64::MIN);
            insert_i64_bound(&mut obj, "max", *max, i64::MAX);
        },
        VariantKind::Double { min, max, .. } => {
            obj.insert("type".into(), json!("double"));
            if !min.is_nan() {
                obj.insert("min".into(), json!(min));
            }
            if !max.is_nan() {
                obj.insert("max".into(), json!(max));
            }
        },
        VariantKind::Scaled { scale, min, max, .. } => {
            obj.insert("type".into(), json!("scaled"));
            obj.insert("scale".into(), json!(scale));
            insert_i64_bound(&mut obj, "min", *min, i64::MIN);
            insert_i64_bound(&mut obj, "max", *max, i64::MAX);
        },
        VariantKind::Enum { members, .. } => {
            obj.insert("type".into(), json!("enum"));
            obj.insert("members".into(), enum_members_json(members));
        },
        VariantKind::ArrayBool { bounds, .. } => {
            obj.insert("type".into(), json!("array"));
            obj.insert("members".into(), json!({"type": "bool"}));
            insert_array_bounds(&mut obj, *bounds);
        },
        VariantKind::ArrayDouble { min, max, bounds, .. } => {
            let mut inner = Map::new();
            inner.insert("type".into(), json!("double"));
            if !min.is_nan() {
                inner.insert("min".into(), json!(min));
            }
            if !max.is_nan() {
                inner.insert("max".into(), json!(max));
            }
            obj.insert("type".into(), json!("array"));
            obj.insert("members".into(), Value::Object(inner));
            insert_array_bounds(&mut obj, *bounds);
        },
        VariantKind::ArrayInt { min, max, bounds, .. } => {
            let mut inner = Map::new();
            inner.insert("type".into(), json!("int"));
            insert_i64_bound(&mut inner, "min", *min, i64::MIN);
            insert_i64_bound(&mut inner, "max", *max, i64::MAX);
            obj.insert("type".into(), json!("array"));
            obj.insert("members".into(), Value::Object(inner));
            insert_array_bounds(&mut obj, *bounds);
        },
        VariantKind::ArrayScaled {
            scale,
            min,
            max,
            bounds,
            ..
        } => {
            let mut inner = Map::new();
            inner.insert("type".into(), json!("scaled"));
            inner.insert("scale".into(), json!(scale));
            insert_i64_bound(&mut inner, "min", *min, i64::MIN);
            insert_i64_bound(&mut inner, "max", *max, i64::MAX);
            obj.insert("type".into(), json!("array"));
            obj.insert("members".into(), Value::Object(inner));
            insert_array_bounds(&mut obj, *bounds);
        },
        VariantKind::ArrayEnum { members, bounds, .. } => {
            let mut inner = Map::new();
            inner.insert("type".into(), json!("enum"));
            inner.insert("members".into(), enum_members_json(members));
            obj.insert("type".into(), json!("array"));
            obj.insert("members".into(), Value::Object(inner));
            insert_array_bounds(&mut obj, *bounds);
        },
        VariantKind::String { is_utf8, bounds, .. } => {
            obj.insert("type".into(), json!("string"));
            obj.insert("isUTF8".into(), json!(is_utf8));
            if bounds.min_len != 0 {
                obj.insert("minchars".into(), json!(bounds.min_len));
            }
            if bounds.max_len != usize::MAX {
                obj.insert("maxchars".into(), json!(bounds.max_len));
            }
        },
        VariantKind::Blob { bounds, .. } => {
            obj.insert("type".into(), json!("blob"));
            if bounds.min_len != 0 {
                obj.insert("minbytes".into(), json!(bounds.min_len));
            }
            if bounds.max_len != usize::MAX {
                obj.insert("maxbytes".into(), json!(bounds.max_len));
            }
        },
        VariantKind::Json { .. } => {
            obj.insert("type".into(), json!("json"));
        },
        VariantKind::Struct { fields } => {
            let mut members = Map::new();
            for (name, field) in fields {
                members.insert(name.clone(), export_type(field));
            }
            obj.insert("type".into(), json!("struct"));
            obj.insert("members".into(), Value::Object(members));
        },
        VariantKind::Tuple { slots } => {
            obj.insert("type".into(), json!("tuple"));
            obj.insert(
                "members".into(),
                Value::Array(slots.iter().map(export_type).collect()),
            );
        },
        VariantKind::Array {
            element_type,
            bounds,
            ..
        } => {
            obj.insert("type".into(), json!("array"));
            obj.insert("members".into(), export_type(element_type));
            insert_array_bounds(&mut obj, *bounds);
        },
        VariantKind::Command { argument, result } => {
            obj.insert("type".into(), json!("command"));
            obj.insert(
                "argument".into(),
                if argument.is_null() {
                    Value::Null
                } else {
                    export_type(argument)
                },
            );
            obj.insert(
                "result".into(),
                if result.is_null() {
                    Value::Null
                } else {
                    export_type(result)
                },
            );
        },
    }
    Value::Object(obj)
}

fn insert_i64_bound(obj: &mut Map<String, Value>, key: &str, value: i64, sentinel: i64) {
    if value != sentinel {
        obj.insert(key.to_string(), json!(value));
    }
}

fn insert_array_bounds(obj: &mut Map<String, Value>, bounds: ArrayBounds) {
    if bounds.min_len != 0 {
        obj.insert("minlen".into(), json!(bounds.min_len));
    }
    if bounds.max_len != usize::MAX {
        obj.insert("maxlen".into(), json!(bounds.max_len));
    }
}

fn enum_members_json(members: &[EnumMember]) -> Value {
    let mut obj = Map::new();
    for m in members {
        obj.insert(m.name.clone(), json!(m.value));
    }
    Value::Object(obj)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_round_trips_through_descriptor() {
        let descriptor = json!({"type": "double", "min": 0.0, "max": 100.0, "unit": "K"});
        let v = create_from_descriptor(&descriptor).unwrap();
        assert_eq!(export_type(&v), descriptor);
    }

    #[test]
    fn enum_round_trips() {
        let descriptor = json!({"type": "enum", "members": {"off": 0, "on": 1}});
        let v = create_from_descriptor(&descriptor).unwrap();
        assert_eq!(export_type(&v), descriptor);
    }

    #[test]
    fn array_of_double_specializes_to_array_double() {
        let descriptor = json!({
            "type": "array",
            "members": {"type": "double", "min": 0.0, "max": 1.0},
            "minlen": 1,
            "maxlen": 16,
        });
        let v = create_from_descriptor(&descriptor).unwrap();
        assert!(matches!(v.kind, VariantKind::ArrayDouble { .. }));
        assert_eq!(export_type(&v), descriptor);
    }

    #[test]
    fn command_with_null_argument() {
        let descriptor = json!({"type": "command", "argument": null, "result": {"type": "bool"}});
        let v = create_from_descriptor(&descriptor).unwrap();
        assert_eq!(export_type(&v), descriptor);
    }

    #[test]
    fn unknown_type_is_invalid() {
        let descriptor = json!({"type": "frobnicator"});
        assert!(create_from_descriptor(&descriptor).is_err());
    }

    #[test]
    fn enum_duplicate_values_are_invalid() {
        let descriptor = json!({"type": "enum", "members": {"off": 0, "disabled": 0}});
        assert!(matches!(
            create_from_descriptor(&descriptor),
            Err(VariantError::InvalidType(_))
        ));
    }

    #[test]
    fn enum_empty_member_name_is_invalid() {
        let descriptor = json!({"type": "enum", "members": {"": 0}});
        assert!(matches!(
            create_from_descriptor(&descriptor),
            Err(VariantError::InvalidType(_))
        ));
    }

    #[test]
    fn enum_with_no_members_is_invalid() {
        let descriptor = json!({"type": "enum", "members": {}});
        assert!(matches!(
            create_from_descriptor(&descriptor),
            Err(VariantError::InvalidType(_))
        ));
    }
}
