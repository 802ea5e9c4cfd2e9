// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Value import/export against an already-typed [`Variant`] (§4.1): moving
//! wire JSON into the tree's current-value slots and back out again.

use base64::Engine as _;
use serde_json::{Map, Value, json};

use super::{Variant, VariantError, VariantKind, error::Result};

const STRICT_BOOL_TOKENS_TRUE: &[&str] = &["true", "t", "y", "yes", "on"];
const STRICT_BOOL_TOKENS_FALSE: &[&str] = &["false", "f", "n", "no", "off"];

/// Validates `json` against `v`'s type and stores it as `v`'s current
/// value. In non-strict mode, coerces a wider range of textual/scalar
/// encodings (§4.1); in strict mode only the canonical wire shape is
/// accepted.
pub fn import_value(v: &mut Variant, json: &Value, strict: bool) -> Result<()> {
    match (&mut v.kind, json) {
        (VariantKind::Null, Value::Null) => Ok(()),
        (VariantKind::Bool(slot), _) => {
            *slot = import_bool(json, strict)?;
            Ok(())
        },
        (VariantKind::Double { value, min, max }, _) => {
            let x = import_f64(json, strict)?;
            check_double(x, *min, *max)?;
            *value = x;
            Ok(())
        },
        (VariantKind::Int { value, min, max }, _) => {
            let x = import_i64(json, strict)?;
            check_int(x, *min, *max)?;
            *value = x;
            Ok(())
        },
        (VariantKind::Scaled { value, scale, min, max }, _) => {
            let x = import_scaled(json, *scale, strict)?;
            check_int(x, *min, *max)?;
            *value = x;
            Ok(())
        },
        (VariantKind::Enum { value, members }, _) => {
            let x = import_enum(json, members, strict)?;
            *value = x;
            Ok(())
        },
        (VariantKind::ArrayBool { values, bounds }, Value::Array(items)) => {
            check_len(items.len(), *bounds)?;
            let mut parsed = Vec::with_capacity(items.len());
            for item in items {
                parsed.push(import_bool(item, strict)?);
            }
            *values = parsed;
            Ok(())
        },
        (VariantKind::ArrayDouble { values, min, max, bounds }, Value::Array(items)) => {
            check_len(items.len(), *bounds)?;
            let mut parsed = Vec::with_capacity(items.len());
            for item in items {
                let x = import_f64(item, strict)?;
                check_double(x, *min, *max)?;
                parsed.push(x);
            }
            *values = parsed;
            Ok(())
        },
        (VariantKind::ArrayInt { values, min, max, bounds }, Value::Array(items)) => {
            check_len(items.len(), *bounds)?;
            let mut parsed = Vec::with_capacity(items.len());
            for item in items {
                let x = import_i64(item, strict)?;
                check_int(x, *min, *max)?;
                parsed.push(x);
            }
            *values = parsed;
            Ok(())
        },
        (
            VariantKind::ArrayScaled {
                values,
                scale,
                min,
                max,
                bounds,
            },
            Value::Array(items),
        ) => {
            check_len(items.len(), *bounds)?;
            let mut parsed = Vec::with_capacity(items.len());
            for item in items {
                let x = import_scaled(item, *scale, strict)?;
                check_int(x, *min, *max)?;
                parsed.push(x);
            }
            *values = parsed;
            Ok(())
        },
        (VariantKind::ArrayEnum { values, members, bounds }, Value::Array(items)) => {
            check_len(items.len(), *bounds)?;
            let mut parsed = Vec::with_capacity(items.len());
            for item in items {
                parsed.push(import_enum(item, members, strict)?);
            }
            *values = parsed;
            Ok(())
        },
        (VariantKind::String { value, bounds, .. }, Value::String(s)) => {
            check_len(s.chars().count(), *bounds)?;
            *value = s.clone();
            Ok(())
        },
        (VariantKind::Blob { value, bounds }, Value::String(s)) => {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(s)
                .map_err(|e| VariantError::InvalidValue(format!("blob is not valid base64: {e}")))?;
            check_len(bytes.len(), *bounds)?;
            *value = bytes;
            Ok(())
        },
        (VariantKind::Json { value }, _) => {
            *value = json.clone();
            Ok(())
        },
        (VariantKind::Struct { fields }, Value::Object(incoming)) => {
            for (name, field) in fields.iter_mut() {
                match incoming.get(name) {
                    Some(item) => import_value(field, item, strict)?,
                    None if strict => {
                        return Err(VariantError::InvalidValue(format!(
                            "struct is missing required field \"{name}\""
                        )));
                    },
                    None => {},
                }
            }
            if !strict {
                for (name, item) in incoming {
                    if !fields.iter().any(|(n, _)| n == name) {
                        fields.push((name.clone(), infer_variant(item)));
                    }
                }
            }
            Ok(())
        },
        (VariantKind::Tuple { slots }, Value::Array(items)) => {
            if strict && items.len() != slots.len() {
                return Err(VariantError::InvalidValue(format!(
                    "tuple expects {} elements, got {}",
                    slots.len(),
                    items.len()
                )));
            }
            if !strict {
                while slots.len() < items.len() {
                    let idx = slots.len();
                    slots.push(infer_variant(&items[idx]));
                }
            }
            for (slot, item) in slots.iter_mut().zip(items.iter()) {
                import_value(slot, item, strict)?;
            }
            Ok(())
        },
        (VariantKind::Array { element_type, elements, bounds }, Value::Array(items)) => {
            check_len(items.len(), *bounds)?;
            let mut parsed = Vec::with_capacity(items.len());
            for item in items {
                let mut element = element_type.duplicate();
                import_value(&mut element, item, strict)?;
                parsed.push(element);
            }
            *elements = parsed;
            Ok(())
        },
        (VariantKind::Command { .. }, _) => Err(VariantError::InvalidValue(
            "command variants hold no importable value".into(),
        )),
        (_, Value::Array(items)) if !strict && items.len() == 1 && !matches!(v.kind, VariantKind::Tuple { .. }) => {
            import_value(v, &items[0], strict)
        },
        _ => Err(VariantError::InvalidValue(format!(
            "value does not match expected type ({:?})",
            v.kind_tag()
        ))),
    }
}

/// Emits `v`'s current value as wire JSON, the inverse of [`import_value`].
pub fn export_value(v: &Variant) -> Value {
    match &v.kind {
        VariantKind::Null => Value::Null,
        VariantKind::Bool(b) => json!(b),
        VariantKind::Double { value, .. } => json!(value),
        VariantKind::Int { value, .. } => json!(value),
        VariantKind::Scaled { value, .. } => json!(value),
        VariantKind::Enum { value, .. } => json!(value),
        VariantKind::ArrayBool { values, .. } => json!(values),
        VariantKind::ArrayDouble { values, .. } => json!(values),
        VariantKind::ArrayInt { values, .. } => json!(values),
        VariantKind::ArrayScaled { values, .. } => json!(values),
        VariantKind::ArrayEnum { values, .. } => json!(values),
        VariantKind::String { value, .. } => json!(value),
        VariantKind::Blob { value, .. } => {
            json!(base64::engine::general_purpose::STANDARD.encode(value))
        },
        VariantKind::Json { value } => value.clone(),
        VariantKind::Struct { fields } => {
            let mut obj = Map::new();
            for (name, field) in fields {
                obj.insert(name.clone(), export_value(field));
            }
            Value::Object(obj)
        },
        VariantKind::Tuple { slots } => Value::Array(slots.iter().map(export_value).collect()),
        VariantKind::Array { elements, .. } => {
            Value::Array(elements.iter().map(export_value).collect())
        },
        VariantKind::Command { .. } => Value::Null,
    }
}

/// Builds a freshly-typed `Variant` whose kind is inferred from a bare JSON
/// literal (used for generic property values that don't carry a
/// `datainfo`-style type descriptor of their own).
pub(crate) fn infer_variant(value: &Value) -> Variant {
    let mut v = match value {
        Value::Null => Variant::null(),
        Value::Bool(b) => Variant::bool(*b),
        Value::Number(n) if n.is_i64() || n.is_u64() => {
            Variant::int(n.as_i64().unwrap_or(0), i64::MIN, i64::MAX)
        },
        Value::Number(n) => Variant::double(n.as_f64().unwrap_or(0.0), f64::NAN, f64::NAN),
        Value::String(_) => Variant {
            kind: VariantKind::String {
                value: String::new(),
                is_utf8: true,
                bounds: super::ArrayBounds::unbounded_from(0),
            },
            additional: Map::new(),
        },
        Value::Array(_) | Value::Object(_) => Variant {
            kind: VariantKind::Json { value: Value::Null },
            additional: Map::new(),
        },
    };
    let _ = import_value(&mut v, value, false);
    v
}

fn import_bool(json: &Value, strict: bool) -> Result<bool> {
    match json {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) if !strict => match n.as_i64() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(VariantError::InvalidValue(format!("{n} is not a valid bool"))),
        },
        Value::String(s) if !strict => {
            let lower = s.to_ascii_lowercase();
            if STRICT_BOOL_TOKENS_TRUE.contains(&lower.as_str()) {
                Ok(true)
            } else if STRICT_BOOL_TOKENS_FALSE.contains(&lower.as_str()) {
                Ok(false)
            } else {
                Err(VariantError::InvalidValue(format!(
                    "\"{s}\" is not one of the recognised bool tokens"
                )))
            }
        },
        other => Err(VariantError::InvalidValue(format!("{other} is not a bool"))),
    }
}

fn import_f64(json: &Value, strict: bool) -> Result<f64> {
    match json {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| VariantError::InvalidValue(format!("{n} is not representable as f64"))),
        Value::String(s) if !strict => match s.to_ascii_lowercase().as_str() {
            "inf" | "+inf" | "infinity" => Ok(f64::INFINITY),
            "-inf" | "-infinity" => Ok(f64::NEG_INFINITY),
            "nan" => Ok(f64::NAN),
            _ => s
                .parse::<f64>()
                .map_err(|_| VariantError::InvalidValue(format!("\"{s}\" is not a number"))),
        },
        other => Err(VariantError::InvalidValue(format!("{other} is not a double"))),
    }
}

fn import_i64(json: &Value, strict: bool) -> Result<i64> {
    match json {
        Value::Number(n) if n.is_i64() || n.is_u64() => n
            .as_i64()
            .ok_or_else(|| VariantError::InvalidValue(format!("{n} does not fit in i64"))),
        Value::Number(n) if !strict && n.is_f64() => {
            let f = n.as_f64().unwrap_or(f64::NAN);
            if f.fract() == 0.0 {
                Ok(f as i64)
            } else {
                Err(VariantError::InvalidValue(format!("{f} is not an integer")))
            }
        },
        Value::String(s) if !strict => s
            .parse::<i64>()
            .map_err(|_| VariantError::InvalidValue(format!("\"{s}\" is not an integer"))),
        other => Err(VariantError::InvalidValue(format!("{other} is not an integer"))),
    }
}

fn import_scaled(json: &Value, scale: f64, strict: bool) -> Result<i64> {
    import_i64(json, strict).or_else(|e| {
        if strict {
            Err(e)
        } else {
            let raw = import_f64(json, strict)?;
            Ok((raw / scale).round() as i64)
        }
    })
}

fn import_enum(json: &Value, members: &[super::EnumMember], strict: bool) -> Result<i64> {
    match json {
        Value::Number(_) => {
            let v = import_i64(json, true)?;
            if members.iter().any(|m| m.value == v) {
                Ok(v)
            } else {
                Err(VariantError::InvalidValue(format!(
                    "{v} is not a declared enum member"
                )))
            }
        },
        Value::String(s) if !strict => members
            .iter()
            .find(|m| m.name == *s)
            .map(|m| m.value)
            .ok_or_else(|| VariantError::InvalidValue(format!("\"{s}\" is not a declared enum member"))),
        other => Err(VariantError::InvalidValue(format!("{other} is not an enum value"))),
    }
}

fn check_double(x: f64, min: f64, max: f64) -> Result<()> {
    let min_ok = min.is_nan() || x >= min;
    let max_ok = max.is_nan() || x <= max;
    if min_ok && max_ok {
        Ok(())
    } else {
        Err(VariantError::OutOfBounds {
            value: x.to_string(),
            min: min.to_string(),
            max: max.to_string(),
        })
    }
}

fn check_int(x: i64, min: i64, max: i64) -> Result<()> {
    if x >= min && x <= max {
        Ok(())
    } else {
        Err(VariantError::OutOfBounds {
            value: x.to_string(),
            min: min.to_string(),
            max: max.to_string(),
        })
    }
}

fn check_len(len: usize, bounds: super::ArrayBounds) -> Result<()> {
    if bounds.contains(len) {
        Ok(())
    } else {
        Err(VariantError::OutOfBounds {
            value: len.to_string(),
            min: bounds.min_len.to_string(),
            max: bounds.max_len.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::descriptor::create_from_descriptor;

    #[test]
    fn strict_double_import_export_round_trips() {
        let mut v = create_from_descriptor(&json!({"type": "double", "min": 0.0, "max": 10.0})).unwrap();
        import_value(&mut v, &json!(7.5), true).unwrap();
        assert_eq!(export_value(&v), json!(7.5));
    }

    #[test]
    fn non_strict_bool_accepts_known_tokens_only() {
        let mut v = create_from_descriptor(&json!({"type": "bool"})).unwrap();
        import_value(&mut v, &json!("yes"), false).unwrap();
        assert_eq!(export_value(&v), json!(true));
        assert!(import_value(&mut v, &json!("banana"), false).is_err());
    }

    #[test]
    fn strict_enum_rejects_name_non_strict_accepts() {
        let mut v = create_from_descriptor(&json!({"type": "enum", "members": {"off": 0, "on": 1}})).unwrap();
        assert!(import_value(&mut v, &json!("on"), true).is_err());
        import_value(&mut v, &json!("on"), false).unwrap();
        assert_eq!(export_value(&v), json!(1));
    }

    #[test]
    fn out_of_bounds_fails_without_mutation() {
        let mut v = create_from_descriptor(&json!({"type": "int", "min": 0, "max": 10})).unwrap();
        import_value(&mut v, &json!(5), true).unwrap();
        assert!(import_value(&mut v, &json!(50), true).is_err());
        assert_eq!(export_value(&v), json!(5));
    }

    #[test]
    fn blob_round_trips_base64() {
        let mut v = create_from_descriptor(&json!({"type": "blob"})).unwrap();
        import_value(&mut v, &json!("aGVsbG8="), true).unwrap();
        assert_eq!(export_value(&v), json!("aGVsbG8="));
    }
}
