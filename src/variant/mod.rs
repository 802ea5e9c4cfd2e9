// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The Variant type system: a recursive, self-describing value tree that
//! backs every SECoP parameter, command argument/result, and struct member.
//!
//! Ownership follows Design Note 9 ("recursive variant with ownership"):
//! complex kinds own their children by value (`Box`/`Vec`), `duplicate()` is
//! `Clone::clone`, and identity-equality is never required.

pub mod compare;
pub mod descriptor;
pub mod error;
pub mod property;
pub mod value;

use std::fmt;

pub use compare::CompareResult;
pub use error::{Result, VariantError};
use serde_json::Map;

/// A single `(name, integer value)` pair of an `Enum`/`ArrayEnum` member
/// list. Names are unique and non-empty; values are unique.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumMember {
    pub name: String,
    pub value: i64,
}

/// Inclusive length bounds shared by every array-like kind
/// (`ArrayBool`/`ArrayDouble`/.../`String`/`Blob`/`Array`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayBounds {
    pub min_len: usize,
    pub max_len: usize,
}

impl ArrayBounds {
    pub fn unbounded_from(min_len: usize) -> Self {
        Self {
            min_len,
            max_len: usize::MAX,
        }
    }

    pub fn contains(&self, len: usize) -> bool {
        len >= self.min_len && len <= self.max_len
    }
}

/// Discriminant of [`VariantKind`] without payload, used for `compare_type`
/// bookkeeping and `get_info`'s reported kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindTag {
    Null,
    Bool,
    Double,
    Int,
    Scaled,
    Enum,
    ArrayBool,
    ArrayDouble,
    ArrayInt,
    ArrayScaled,
    ArrayEnum,
    String,
    Blob,
    Json,
    Struct,
    Tuple,
    Array,
    Command,
}

/// The recursive value tree. Every node additionally carries a bag of
/// free-form JSON (`additional`) for out-of-band SECoP metadata (e.g.
/// `unit`) that isn't one of the canonical descriptor fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Variant {
    pub kind: VariantKind,
    pub additional: Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VariantKind {
    Null,
    Bool(bool),
    Double {
        value: f64,
        min: f64,
        max: f64,
    },
    Int {
        value: i64,
        min: i64,
        max: i64,
    },
    Scaled {
        value: i64,
        scale: f64,
        min: i64,
        max: i64,
    },
    Enum {
        value: i64,
        members: Vec<EnumMember>,
    },
    ArrayBool {
        values: Vec<bool>,
        bounds: ArrayBounds,
    },
    ArrayDouble {
        values: Vec<f64>,
        min: f64,
        max: f64,
        bounds: ArrayBounds,
    },
    ArrayInt {
        values: Vec<i64>,
        min: i64,
        max: i64,
        bounds: ArrayBounds,
    },
    ArrayScaled {
        values: Vec<i64>,
        scale: f64,
        min: i64,
        max: i64,
        bounds: ArrayBounds,
    },
    ArrayEnum {
        values: Vec<i64>,
        members: Vec<EnumMember>,
        bounds: ArrayBounds,
    },
    String {
        value: String,
        is_utf8: bool,
        bounds: ArrayBounds,
    },
    Blob {
        value: Vec<u8>,
        bounds: ArrayBounds,
    },
    Json {
        value: serde_json::Value,
    },
    /// Case-insensitive unique keys, insertion order preserved.
    Struct {
        fields: Vec<(String, Variant)>,
    },
    Tuple {
        slots: Vec<Variant>,
    },
    /// Generic array of a prototype element type. `element_type` validates
    /// every element via `compare_type`.
    Array {
        element_type: Box<Variant>,
        elements: Vec<Variant>,
        bounds: ArrayBounds,
    },
    /// Argument/result sub-variants. Absence is represented by
    /// `VariantKind::Null`, never by omitting the box.
    Command {
        argument: Box<Variant>,
        result: Box<Variant>,
    },
}

/// Result of [`Variant::get_info`]: the kind, immediate child/element count,
/// and (for direct struct children only) the declared field name.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeInfo {
    pub kind: KindTag,
    pub count: usize,
    pub name: Option<String>,
}

impl Variant {
    pub fn null() -> Self {
        Self {
            kind: VariantKind::Null,
            additional: Map::new(),
        }
    }

    pub fn bool(value: bool) -> Self {
        Self {
            kind: VariantKind::Bool(value),
            additional: Map::new(),
        }
    }

    pub fn double(value: f64, min: f64, max: f64) -> Self {
        Self {
            kind: VariantKind::Double { value, min, max },
            additional: Map::new(),
        }
    }

    pub fn int(value: i64, min: i64, max: i64) -> Self {
        Self {
            kind: VariantKind::Int { value, min, max },
            additional: Map::new(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self.kind, VariantKind::Null)
    }

    /// Deep clone. Identity-equality of variants is never required.
    pub fn duplicate(&self) -> Self {
        self.clone()
    }

    /// Builds a freshly-typed variant whose kind is inferred from a bare
    /// JSON literal, for generic property values that carry no type
    /// descriptor of their own (e.g. `description`, `group`).
    pub fn from_json_literal(value: &serde_json::Value) -> Self {
        value::infer_variant(value)
    }

    pub fn kind_tag(&self) -> KindTag {
        match &self.kind {
            VariantKind::Null => KindTag::Null,
            VariantKind::Bool(_) => KindTag::Bool,
            VariantKind::Double { .. } => KindTag::Double,
            VariantKind::Int { .. } => KindTag::Int,
            VariantKind::Scaled { .. } => KindTag::Scaled,
            VariantKind::Enum { .. } => KindTag::Enum,
            VariantKind::ArrayBool { .. } => KindTag::ArrayBool,
            VariantKind::ArrayDouble { .. } => KindTag::ArrayDouble,
            VariantKind::ArrayInt { .. } => KindTag::ArrayInt,
            VariantKind::ArrayScaled { .. } => KindTag::ArrayScaled,
            VariantKind::ArrayEnum { .. } => KindTag::ArrayEnum,
            VariantKind::String { .. } => KindTag::String,
            VariantKind::Blob { .. } => KindTag::Blob,
            VariantKind::Json { .. } => KindTag::Json,
            VariantKind::Struct { .. } => KindTag::Struct,
            VariantKind::Tuple { .. } => KindTag::Tuple,
            VariantKind::Array { .. } => KindTag::Array,
            VariantKind::Command { .. } => KindTag::Command,
        }
    }

    /// Immediate child count for complex kinds, array length for
    /// arrays/strings/blobs, 1 for scalars (matches `get_info`'s `count`).
    pub fn immediate_count(&self) -> usize {
        match &self.kind {
            VariantKind::Null => 0,
            VariantKind::Bool(_) | VariantKind::Double { .. } | VariantKind::Int { .. } => 1,
            VariantKind::Scaled { .. } | VariantKind::Enum { .. } => 1,
            VariantKind::ArrayBool { values, .. } => values.len(),
            VariantKind::ArrayDouble { values, .. } => values.len(),
            VariantKind::ArrayInt { values, .. } => values.len(),
            VariantKind::ArrayScaled { values, .. } => values.len(),
            VariantKind::ArrayEnum { values, .. } => values.len(),
            VariantKind::String { value, .. } => value.chars().count(),
            VariantKind::Blob { value, .. } => value.len(),
            VariantKind::Json { .. } => 1,
            VariantKind::Struct { fields } => fields.len(),
            VariantKind::Tuple { slots } => slots.len(),
            VariantKind::Array { elements, .. } => elements.len(),
            VariantKind::Command { .. } => 2,
        }
    }

    fn subtree_size(&self) -> usize {
        let children = 1;
        children
            + match &self.kind {
                VariantKind::Struct { fields } => {
                    fields.iter().map(|(_, c)| c.subtree_size()).sum()
                },
                VariantKind::Tuple { slots } => slots.iter().map(Variant::subtree_size).sum(),
                VariantKind::Array { elements, .. } => {
                    elements.iter().map(Variant::subtree_size).sum()
                },
                VariantKind::Command { argument, result } => {
                    argument.subtree_size() + result.subtree_size()
                },
                _ => 0,
            }
    }

    fn find(&self, pos: usize) -> Option<(&Variant, Option<String>)> {
        if pos == 0 {
            return Some((self, None));
        }
        let mut remaining = pos - 1;
        match &self.kind {
            VariantKind::Struct { fields } => {
                for (key, child) in fields {
                    let size = child.subtree_size();
                    if remaining < size {
                        return if remaining == 0 {
                            Some((child, Some(key.clone())))
                        } else {
                            child.find(remaining)
                        };
                    }
                    remaining -= size;
                }
                None
            },
            VariantKind::Tuple { slots } => Self::find_in_list(slots, remaining),
            VariantKind::Array { elements, .. } => Self::find_in_list(elements, remaining),
            VariantKind::Command { argument, result } => {
                Self::find_in_list(std::slice::from_ref(argument), remaining).or_else(|| {
                    let arg_size = argument.subtree_size();
                    if remaining >= arg_size {
                        Self::find_in_list(
                            std::slice::from_ref(result),
                            remaining - arg_size,
                        )
                    } else {
                        None
                    }
                })
            },
            _ => None,
        }
    }

    fn find_in_list(list: &[Variant], mut remaining: usize) -> Option<(&Variant, Option<String>)> {
        for child in list {
            let size = child.subtree_size();
            if remaining < size {
                return if remaining == 0 {
                    Some((child, None))
                } else {
                    child.find(remaining)
                };
            }
            remaining -= size;
        }
        None
    }

    fn find_mut(&mut self, pos: usize) -> Option<&mut Variant> {
        if pos == 0 {
            return Some(self);
        }
        let mut remaining = pos - 1;
        match &mut self.kind {
            VariantKind::Struct { fields } => {
                for (_, child) in fields.iter_mut() {
                    let size = child.subtree_size();
                    if remaining < size {
                        return child.find_mut(remaining);
                    }
                    remaining -= size;
                }
                None
            },
            VariantKind::Tuple { slots } => Self::find_mut_in_list(slots, remaining),
            VariantKind::Array { elements, .. } => Self::find_mut_in_list(elements, remaining),
            VariantKind::Command { argument, result } => {
                let arg_size = argument.subtree_size();
                if remaining < arg_size {
                    argument.find_mut(remaining)
                } else {
                    result.find_mut(remaining - arg_size)
                }
            },
            _ => None,
        }
    }

    fn find_mut_in_list(list: &mut [Variant], mut remaining: usize) -> Option<&mut Variant> {
        for child in list.iter_mut() {
            let size = child.subtree_size();
            if remaining < size {
                return child.find_mut(remaining);
            }
            remaining -= size;
        }
        None
    }

    /// Pre-order traversal addressing (§4.1). Returns `None` ("end") once
    /// `pos` exceeds the tree.
    pub fn get_info(&self, pos: usize) -> Option<NodeInfo> {
        let (node, name) = self.find(pos)?;
        Some(NodeInfo {
            kind: node.kind_tag(),
            count: node.immediate_count(),
            name,
        })
    }

    pub fn get_double(&self, pos: usize, index: usize) -> Result<f64> {
        let (node, _) = self.find(pos).ok_or(VariantError::NoSuchPosition(pos))?;
        match &node.kind {
            VariantKind::Double { value, .. } if index == 0 => Ok(*value),
            VariantKind::ArrayDouble { values, .. } => values
                .get(index)
                .copied()
                .ok_or(VariantError::NoSuchPosition(pos)),
            _ => Err(VariantError::KindMismatch(pos)),
        }
    }

    pub fn get_integer(&self, pos: usize, index: usize) -> Result<i64> {
        let (node, _) = self.find(pos).ok_or(VariantError::NoSuchPosition(pos))?;
        match &node.kind {
            VariantKind::Int { value, .. } | VariantKind::Scaled { value, .. }
                if index == 0 =>
            {
                Ok(*value)
            },
            VariantKind::Enum { value, .. } if index == 0 => Ok(*value),
            VariantKind::ArrayInt { values, .. }
            | VariantKind::ArrayScaled { values, .. }
            | VariantKind::ArrayEnum { values, .. } => values
                .get(index)
                .copied()
                .ok_or(VariantError::NoSuchPosition(pos)),
            _ => Err(VariantError::KindMismatch(pos)),
        }
    }

    pub fn get_string_bytes(&self, pos: usize) -> Result<Vec<u8>> {
        let (node, _) = self.find(pos).ok_or(VariantError::NoSuchPosition(pos))?;
        match &node.kind {
            VariantKind::String { value, .. } => Ok(value.clone().into_bytes()),
            VariantKind::Blob { value, .. } => Ok(value.clone()),
            _ => Err(VariantError::KindMismatch(pos)),
        }
    }

    pub fn get_scale(&self, pos: usize) -> Result<f64> {
        let (node, _) = self.find(pos).ok_or(VariantError::NoSuchPosition(pos))?;
        match &node.kind {
            VariantKind::Scaled { scale, .. } | VariantKind::ArrayScaled { scale, .. } => {
                Ok(*scale)
            },
            _ => Err(VariantError::KindMismatch(pos)),
        }
    }

    pub fn get_enum_count(&self, pos: usize) -> Result<usize> {
        let (node, _) = self.find(pos).ok_or(VariantError::NoSuchPosition(pos))?;
        match &node.kind {
            VariantKind::Enum { members, .. } | VariantKind::ArrayEnum { members, .. } => {
                Ok(members.len())
            },
            _ => Err(VariantError::KindMismatch(pos)),
        }
    }

    pub fn get_enum_name(&self, pos: usize, index: usize) -> Result<String> {
        let (node, _) = self.find(pos).ok_or(VariantError::NoSuchPosition(pos))?;
        match &node.kind {
            VariantKind::Enum { members, .. } | VariantKind::ArrayEnum { members, .. } => members
                .get(index)
                .map(|m| m.name.clone())
                .ok_or(VariantError::NoSuchPosition(pos)),
            _ => Err(VariantError::KindMismatch(pos)),
        }
    }

    pub fn get_enum_value(&self, pos: usize, index: usize) -> Result<i64> {
        let (node, _) = self.find(pos).ok_or(VariantError::NoSuchPosition(pos))?;
        match &node.kind {
            VariantKind::Enum { members, .. } | VariantKind::ArrayEnum { members, .. } => members
                .get(index)
                .map(|m| m.value)
                .ok_or(VariantError::NoSuchPosition(pos)),
            _ => Err(VariantError::KindMismatch(pos)),
        }
    }

    pub fn get_array_length(&self, pos: usize) -> Result<usize> {
        let (node, _) = self.find(pos).ok_or(VariantError::NoSuchPosition(pos))?;
        match &node.kind {
            VariantKind::ArrayBool { values, .. } => Ok(values.len()),
            VariantKind::ArrayDouble { values, .. } => Ok(values.len()),
            VariantKind::ArrayInt { values, .. } => Ok(values.len()),
            VariantKind::ArrayScaled { values, .. } => Ok(values.len()),
            VariantKind::ArrayEnum { values, .. } => Ok(values.len()),
            VariantKind::Array { elements, .. } => Ok(elements.len()),
            VariantKind::String { value, .. } => Ok(value.chars().count()),
            VariantKind::Blob { value, .. } => Ok(value.len()),
            _ => Err(VariantError::KindMismatch(pos)),
        }
    }

    pub fn modify_double(&mut self, pos: usize, index: usize, x: f64) -> Result<()> {
        let node = self
            .find_mut(pos)
            .ok_or(VariantError::NoSuchPosition(pos))?;
        match &mut node.kind {
            VariantKind::Double { value, min, max } if index == 0 => {
                check_double_bounds(x, *min, *max)?;
                *value = x;
                Ok(())
            },
            VariantKind::ArrayDouble { values, min, max, .. } => {
                check_double_bounds(x, *min, *max)?;
                let slot = values
                    .get_mut(index)
                    .ok_or(VariantError::NoSuchPosition(pos))?;
                *slot = x;
                Ok(())
            },
            _ => Err(VariantError::KindMismatch(pos)),
        }
    }

    pub fn modify_integer(&mut self, pos: usize, index: usize, x: i64) -> Result<()> {
        let node = self
            .find_mut(pos)
            .ok_or(VariantError::NoSuchPosition(pos))?;
        match &mut node.kind {
            VariantKind::Int { value, min, max } if index == 0 => {
                check_int_bounds(x, *min, *max)?;
                *value = x;
                Ok(())
            },
            VariantKind::Scaled { value, min, max, .. } if index == 0 => {
                check_int_bounds(x, *min, *max)?;
                *value = x;
                Ok(())
            },
            VariantKind::ArrayInt { values, min, max, .. } => {
                check_int_bounds(x, *min, *max)?;
                let slot = values
                    .get_mut(index)
                    .ok_or(VariantError::NoSuchPosition(pos))?;
                *slot = x;
                Ok(())
            },
            VariantKind::ArrayScaled { values, min, max, .. } => {
                check_int_bounds(x, *min, *max)?;
                let slot = values
                    .get_mut(index)
                    .ok_or(VariantError::NoSuchPosition(pos))?;
                *slot = x;
                Ok(())
            },
            _ => Err(VariantError::KindMismatch(pos)),
        }
    }

    pub fn modify_string(&mut self, pos: usize, value: &str) -> Result<()> {
        let node = self
            .find_mut(pos)
            .ok_or(VariantError::NoSuchPosition(pos))?;
        match &mut node.kind {
            VariantKind::String {
                value: slot,
                bounds,
                ..
            } => {
                if !bounds.contains(value.chars().count()) {
                    return Err(VariantError::OutOfBounds {
                        value: value.len().to_string(),
                        min: bounds.min_len.to_string(),
                        max: bounds.max_len.to_string(),
                    });
                }
                *slot = value.to_string();
                Ok(())
            },
            _ => Err(VariantError::KindMismatch(pos)),
        }
    }

    pub fn modify_scale(&mut self, pos: usize, scale: f64) -> Result<()> {
        if !(scale.is_finite() && scale > 0.0) {
            return Err(VariantError::InvalidValue(
                "scale must be a positive finite number".into(),
            ));
        }
        let node = self
            .find_mut(pos)
            .ok_or(VariantError::NoSuchPosition(pos))?;
        match &mut node.kind {
            VariantKind::Scaled { scale: slot, .. } | VariantKind::ArrayScaled { scale: slot, .. } => {
                *slot = scale;
                Ok(())
            },
            _ => Err(VariantError::KindMismatch(pos)),
        }
    }

    pub fn modify_enum(&mut self, pos: usize, index: usize, new_value: i64) -> Result<()> {
        let node = self
            .find_mut(pos)
            .ok_or(VariantError::NoSuchPosition(pos))?;
        match &mut node.kind {
            VariantKind::Enum { value, members } if index == 0 => {
                if !members.iter().any(|m| m.value == new_value) {
                    return Err(VariantError::InvalidValue(format!(
                        "{new_value} is not a declared enum member"
                    )));
                }
                *value = new_value;
                Ok(())
            },
            VariantKind::ArrayEnum { values, members, .. } => {
                if !members.iter().any(|m| m.value == new_value) {
                    return Err(VariantError::InvalidValue(format!(
                        "{new_value} is not a declared enum member"
                    )));
                }
                let slot = values
                    .get_mut(index)
                    .ok_or(VariantError::NoSuchPosition(pos))?;
                *slot = new_value;
                Ok(())
            },
            _ => Err(VariantError::KindMismatch(pos)),
        }
    }

    pub fn modify_array_length(&mut self, pos: usize, new_len: usize) -> Result<()> {
        let node = self
            .find_mut(pos)
            .ok_or(VariantError::NoSuchPosition(pos))?;
        macro_rules! resize_numeric {
            ($values:expr, $bounds:expr, $fill:expr) => {{
                if !$bounds.contains(new_len) {
                    return Err(VariantError::BoundConflict(format!(
                        "length {new_len} outside [{}, {}]",
                        $bounds.min_len, $bounds.max_len
                    )));
                }
                $values.resize(new_len, $fill);
                Ok(())
            }};
        }
        match &mut node.kind {
            VariantKind::ArrayBool { values, bounds } => resize_numeric!(values, bounds, false),
            VariantKind::ArrayDouble { values, bounds, .. } => {
                resize_numeric!(values, bounds, 0.0)
            },
            VariantKind::ArrayInt { values, bounds, .. } => resize_numeric!(values, bounds, 0),
            VariantKind::ArrayScaled { values, bounds, .. } => {
                resize_numeric!(values, bounds, 0)
            },
            VariantKind::ArrayEnum { values, bounds, members } => {
                let fill = members.first().map(|m| m.value).unwrap_or(0);
                resize_numeric!(values, bounds, fill)
            },
            VariantKind::Blob { value, bounds } => resize_numeric!(value, bounds, 0u8),
            VariantKind::Array {
                elements,
                bounds,
                element_type,
            } => {
                if !bounds.contains(new_len) {
                    return Err(VariantError::BoundConflict(format!(
                        "length {new_len} outside [{}, {}]",
                        bounds.min_len, bounds.max_len
                    )));
                }
                let fill = element_type.duplicate();
                elements.resize(new_len, fill);
                Ok(())
            },
            _ => Err(VariantError::KindMismatch(pos)),
        }
    }

    pub fn modify_min_max_double(&mut self, pos: usize, new_min: f64, new_max: f64) -> Result<()> {
        if !(new_min.is_nan() || new_max.is_nan() || new_min <= new_max) {
            return Err(VariantError::InvalidValue("min must be <= max".into()));
        }
        let node = self
            .find_mut(pos)
            .ok_or(VariantError::NoSuchPosition(pos))?;
        match &mut node.kind {
            VariantKind::Double { value, min, max } => {
                check_double_bounds(*value, new_min, new_max)?;
                *min = new_min;
                *max = new_max;
                Ok(())
            },
            VariantKind::ArrayDouble { values, min, max, .. } => {
                for v in values.iter() {
                    check_double_bounds(*v, new_min, new_max)?;
                }
                *min = new_min;
                *max = new_max;
                Ok(())
            },
            _ => Err(VariantError::KindMismatch(pos)),
        }
    }

    pub fn modify_min_max_integer(&mut self, pos: usize, new_min: i64, new_max: i64) -> Result<()> {
        if new_min > new_max {
            return Err(VariantError::InvalidValue("min must be <= max".into()));
        }
        let node = self
            .find_mut(pos)
            .ok_or(VariantError::NoSuchPosition(pos))?;
        match &mut node.kind {
            VariantKind::Int { value, min, max } => {
                check_int_bounds(*value, new_min, new_max)?;
                *min = new_min;
                *max = new_max;
                Ok(())
            },
            VariantKind::Scaled { value, min, max, .. } => {
                check_int_bounds(*value, new_min, new_max)?;
                *min = new_min;
                *max = new_max;
                Ok(())
            },
            VariantKind::ArrayInt { values, min, max, .. }
            | VariantKind::ArrayScaled { values, min, max, .. } => {
                for v in values.iter() {
                    check_int_bounds(*v, new_min, new_max)?;
                }
                *min = new_min;
                *max = new_max;
                Ok(())
            },
            _ => Err(VariantError::KindMismatch(pos)),
        }
    }
}

fn check_double_bounds(x: f64, min: f64, max: f64) -> Result<()> {
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

fn check_int_bounds(x: i64, min: i64, max: i64) -> Result<()> {
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

impl fmt::Display for KindTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            KindTag::Null => "null",
            KindTag::Bool => "bool",
            KindTag::Double => "double",
            KindTag::Int => "int",
            KindTag::Scaled => "scaled",
            KindTag::Enum => "enum",
            KindTag::ArrayBool => "array_bool",
            KindTag::ArrayDouble => "array_double",
            KindTag::ArrayInt => "array_int",
            KindTag::ArrayScaled => "array_scaled",
            KindTag::ArrayEnum => "array_enum",
            KindTag::String => "string",
            KindTag::Blob => "blob",
            KindTag::Json => "json",
            KindTag::Struct => "struct",
            KindTag::Tuple => "tuple",
            KindTag::Array => "array",
            KindTag::Command => "command",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_info_scalar_is_end_after_root() {
        let v = Variant::double(1.0, 0.0, 10.0);
        assert!(v.get_info(0).is_some());
        assert!(v.get_info(1).is_none());
    }

    #[test]
    fn get_info_struct_children_carry_name() {
        let v = Variant {
            kind: VariantKind::Struct {
                fields: vec![
                    ("a".to_string(), Variant::int(1, 0, 10)),
                    ("b".to_string(), Variant::bool(true)),
                ],
            },
            additional: Map::new(),
        };
        let root = v.get_info(0).unwrap();
        assert_eq!(root.kind, KindTag::Struct);
        assert_eq!(root.count, 2);
        assert_eq!(root.name, None);

        let a = v.get_info(1).unwrap();
        assert_eq!(a.kind, KindTag::Int);
        assert_eq!(a.name.as_deref(), Some("a"));

        let b = v.get_info(2).unwrap();
        assert_eq!(b.kind, KindTag::Bool);
        assert_eq!(b.name.as_deref(), Some("b"));

        assert!(v.get_info(3).is_none());
    }

    #[test]
    fn modify_double_rejects_out_of_bounds_without_side_effect() {
        let mut v = Variant::double(5.0, 0.0, 10.0);
        assert!(v.modify_double(0, 0, 20.0).is_err());
        assert_eq!(v.get_double(0, 0).unwrap(), 5.0);
        assert!(v.modify_double(0, 0, 7.5).is_ok());
        assert_eq!(v.get_double(0, 0).unwrap(), 7.5);
    }

    #[test]
    fn modify_array_length_respects_bounds() {
        let mut v = Variant {
            kind: VariantKind::ArrayInt {
                values: vec![1, 2, 3],
                min: 0,
                max: 100,
                bounds: ArrayBounds {
                    min_len: 1,
                    max_len: 5,
                },
            },
            additional: Map::new(),
        };
        assert!(v.modify_array_length(0, 6).is_err());
        assert!(v.modify_array_length(0, 5).is_ok());
        assert_eq!(v.get_array_length(0).unwrap(), 5);
    }

    #[test]
    fn command_addresses_argument_and_result_as_two_slots() {
        let v = Variant {
            kind: VariantKind::Command {
                argument: Box::new(Variant::null()),
                result: Box::new(Variant::double(0.0, f64::NAN, f64::NAN)),
            },
            additional: Map::new(),
        };
        let root = v.get_info(0).unwrap();
        assert_eq!(root.kind, KindTag::Command);
        assert_eq!(root.count, 2);
        assert_eq!(v.get_info(1).unwrap().kind, KindTag::Null);
        assert_eq!(v.get_info(2).unwrap().kind, KindTag::Double);
        assert!(v.get_info(3).is_none());
    }
}
