// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! `compare_type`/`compare_value` (§4.1): deciding whether two variants
//! describe the same wire shape, and whether two values of that shape are
//! numerically equal, similar, or different.

use super::{Variant, VariantKind};

/// Outcome of [`compare_value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareResult {
    Equal,
    /// Numerically close but not bit-identical (used for floating point
    /// parameters compared against a `sigma`/tolerance).
    SimilarValue,
    DiffValue,
    DiffType,
}

/// True if `a` and `b` describe the same shape: same kind, same
/// bounds/min/max/members/scale, same struct field names in the same
/// order, same tuple arity, same array element type. Current *values* are
/// not considered.
pub fn compare_type(a: &Variant, b: &Variant) -> bool {
    match (&a.kind, &b.kind) {
        (VariantKind::Null, VariantKind::Null) => true,
        (VariantKind::Bool(_), VariantKind::Bool(_)) => true,
        (
            VariantKind::Double { min: amin, max: amax, .. },
            VariantKind::Double { min: bmin, max: bmax, .. },
        ) => bits_eq(*amin, *bmin) && bits_eq(*amax, *bmax),
        (
            VariantKind::Int { min: amin, max: amax, .. },
            VariantKind::Int { min: bmin, max: bmax, .. },
        ) => amin == bmin && amax == bmax,
        (
            VariantKind::Scaled {
                scale: ascale,
                min: amin,
                max: amax,
                ..
            },
            VariantKind::Scaled {
                scale: bscale,
                min: bmin,
                max: bmax,
                ..
            },
        ) => bits_eq(*ascale, *bscale) && amin == bmin && amax == bmax,
        (
            VariantKind::Enum { members: am, .. },
            VariantKind::Enum { members: bm, .. },
        ) => am == bm,
        (
            VariantKind::ArrayBool { bounds: ab, .. },
            VariantKind::ArrayBool { bounds: bb, .. },
        ) => ab == bb,
        (
            VariantKind::ArrayDouble {
                min: amin,
                max: amax,
                bounds: ab,
                ..
            },
            VariantKind::ArrayDouble {
                min: bmin,
                max: bmax,
                bounds: bb,
                ..
            },
        ) => bits_eq(*amin, *bmin) && bits_eq(*amax, *bmax) && ab == bb,
        (
            VariantKind::ArrayInt {
                min: amin,
                max: amax,
                bounds: ab,
                ..
            },
            VariantKind::ArrayInt {
                min: bmin,
                max: bmax,
                bounds: bb,
                ..
            },
        ) => amin == bmin && amax == bmax && ab == bb,
        (
            VariantKind::ArrayScaled {
                scale: ascale,
                min: amin,
                max: amax,
                bounds: ab,
                ..
            },
            VariantKind::ArrayScaled {
                scale: bscale,
                min: bmin,
                max: bmax,
                bounds: bb,
                ..
            },
        ) => bits_eq(*ascale, *bscale) && amin == bmin && amax == bmax && ab == bb,
        (
            VariantKind::ArrayEnum {
                members: am,
                bounds: ab,
                ..
            },
            VariantKind::ArrayEnum {
                members: bm,
                bounds: bb,
                ..
            },
        ) => am == bm && ab == bb,
        (
            VariantKind::String { bounds: ab, is_utf8: au, .. },
            VariantKind::String { bounds: bb, is_utf8: bu, .. },
        ) => ab == bb && au == bu,
        (VariantKind::Blob { bounds: ab, .. }, VariantKind::Blob { bounds: bb, .. }) => {
            ab == bb
        },
        (VariantKind::Json { .. }, VariantKind::Json { .. }) => true,
        (VariantKind::Struct { fields: af }, VariantKind::Struct { fields: bf }) => {
            af.len() == bf.len()
                && af
                    .iter()
                    .zip(bf.iter())
                    .all(|((an, av), (bn, bv))| an.eq_ignore_ascii_case(bn) && compare_type(av, bv))
        },
        (VariantKind::Tuple { slots: a_slots }, VariantKind::Tuple { slots: b_slots }) => {
            a_slots.len() == b_slots.len()
                && a_slots
                    .iter()
                    .zip(b_slots.iter())
                    .all(|(x, y)| compare_type(x, y))
        },
        (
            VariantKind::Array {
                element_type: ae,
                bounds: ab,
                ..
            },
            VariantKind::Array {
                element_type: be,
                bounds: bb,
                ..
            },
        ) => ab == bb && compare_type(ae, be),
        (
            VariantKind::Command {
                argument: aa,
                result: ar,
            },
            VariantKind::Command {
                argument: ba,
                result: br,
            },
        ) => compare_type(aa, ba) && compare_type(ar, br),
        _ => false,
    }
}

/// Numeric/structural comparison of current values. Requires `compare_type`
/// to hold first; callers that skip that check get `DiffType` back instead
/// of a false positive.
pub fn compare_value(a: &Variant, b: &Variant) -> CompareResult {
    if !compare_type(a, b) {
        return CompareResult::DiffType;
    }
    match (&a.kind, &b.kind) {
        (VariantKind::Null, VariantKind::Null) => CompareResult::Equal,
        (VariantKind::Bool(x), VariantKind::Bool(y)) => bool_result(x == y),
        (VariantKind::Double { value: x, .. }, VariantKind::Double { value: y, .. }) => {
            double_result(*x, *y)
        },
        (VariantKind::Int { value: x, .. }, VariantKind::Int { value: y, .. }) => {
            bool_result(x == y)
        },
        (VariantKind::Scaled { value: x, scale, .. }, VariantKind::Scaled { value: y, .. }) => {
            double_result(*x as f64 * scale, *y as f64 * scale)
        },
        (VariantKind::Enum { value: x, .. }, VariantKind::Enum { value: y, .. }) => {
            bool_result(x == y)
        },
        (VariantKind::ArrayBool { values: x, .. }, VariantKind::ArrayBool { values: y, .. }) => {
            bool_result(x == y)
        },
        (
            VariantKind::ArrayDouble { values: x, .. },
            VariantKind::ArrayDouble { values: y, .. },
        ) => array_double_result(x, y),
        (VariantKind::ArrayInt { values: x, .. }, VariantKind::ArrayInt { values: y, .. }) => {
            bool_result(x == y)
        },
        (
            VariantKind::ArrayScaled { values: x, scale, .. },
            VariantKind::ArrayScaled { values: y, .. },
        ) => {
            if x.len() != y.len() {
                CompareResult::DiffValue
            } else {
                merge(
                    x.iter()
                        .zip(y.iter())
                        .map(|(a, b)| double_result(*a as f64 * scale, *b as f64 * scale)),
                )
            }
        },
        (VariantKind::ArrayEnum { values: x, .. }, VariantKind::ArrayEnum { values: y, .. }) => {
            bool_result(x == y)
        },
        (VariantKind::String { value: x, .. }, VariantKind::String { value: y, .. }) => {
            bool_result(x == y)
        },
        (VariantKind::Blob { value: x, .. }, VariantKind::Blob { value: y, .. }) => {
            bool_result(x == y)
        },
        (VariantKind::Json { value: x }, VariantKind::Json { value: y }) => bool_result(x == y),
        (VariantKind::Struct { fields: x }, VariantKind::Struct { fields: y }) => {
            merge(x.iter().zip(y.iter()).map(|((_, a), (_, b))| compare_value(a, b)))
        },
        (VariantKind::Tuple { slots: x }, VariantKind::Tuple { slots: y }) => {
            merge(x.iter().zip(y.iter()).map(|(a, b)| compare_value(a, b)))
        },
        (VariantKind::Array { elements: x, .. }, VariantKind::Array { elements: y, .. }) => {
            if x.len() != y.len() {
                CompareResult::DiffValue
            } else {
                merge(x.iter().zip(y.iter()).map(|(a, b)| compare_value(a, b)))
            }
        },
        (
            VariantKind::Command {
                argument: xa,
                result: xr,
            },
            VariantKind::Command {
                argument: ya,
                result: yr,
            },
        ) => merge([compare_value(xa, ya), compare_value(xr, yr)].into_iter()),
        _ => CompareResult::DiffType,
    }
}

fn bits_eq(a: f64, b: f64) -> bool {
    (a.is_nan() && b.is_nan()) || a.to_bits() == b.to_bits()
}

fn bool_result(eq: bool) -> CompareResult {
    if eq {
        CompareResult::Equal
    } else {
        CompareResult::DiffValue
    }
}

fn double_result(x: f64, y: f64) -> CompareResult {
    if x == y || (x.is_nan() && y.is_nan()) {
        CompareResult::Equal
    } else if (x - y).abs() <= 1e-9 * x.abs().max(y.abs()).max(1.0) {
        CompareResult::SimilarValue
    } else {
        CompareResult::DiffValue
    }
}

fn array_double_result(x: &[f64], y: &[f64]) -> CompareResult {
    if x.len() != y.len() {
        return CompareResult::DiffValue;
    }
    merge(x.iter().zip(y.iter()).map(|(a, b)| double_result(*a, *b)))
}

fn merge(results: impl Iterator<Item = CompareResult>) -> CompareResult {
    let mut seen_similar = false;
    for r in results {
        match r {
            CompareResult::Equal => {},
            CompareResult::SimilarValue => seen_similar = true,
            CompareResult::DiffValue | CompareResult::DiffType => return CompareResult::DiffValue,
        }
    }
    if seen_similar {
        CompareResult::SimilarValue
    } else {
        CompareResult::Equal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::Variant;

    #[test]
    fn same_bounds_same_type() {
        let a = Variant::double(1.0, 0.0, 10.0);
        let b = Variant::double(9.0, 0.0, 10.0);
        assert!(compare_type(&a, &b));
        assert_eq!(compare_value(&a, &b), CompareResult::DiffValue);
    }

    #[test]
    fn different_bounds_different_type() {
        let a = Variant::double(1.0, 0.0, 10.0);
        let b = Variant::double(1.0, 0.0, 20.0);
        assert!(!compare_type(&a, &b));
        assert_eq!(compare_value(&a, &b), CompareResult::DiffType);
    }

    #[test]
    fn near_equal_floats_are_similar() {
        let a = Variant::double(1.000_000_000_1, f64::NAN, f64::NAN);
        let b = Variant::double(1.000_000_000_2, f64::NAN, f64::NAN);
        assert_eq!(compare_value(&a, &b), CompareResult::SimilarValue);
    }
}
