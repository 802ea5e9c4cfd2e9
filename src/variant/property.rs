// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Static tables shared by node construction and the property store:
//! which owner kind recognises which property key, and the identifier
//! grammar used for node/module/accessible names alike.

/// The four kinds of thing a [`crate::property::Property`] can be attached
/// to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OwnerKind {
    Node,
    Module,
    Parameter,
    Command,
}

const NODE_KEYS: &[&str] = &["description", "equipment_id", "firmware", "version"];
const MODULE_KEYS: &[&str] = &[
    "description",
    "interface_classes",
    "visibility",
    "group",
    "meaning",
    "implementor",
    "pollinterval",
];
const PARAMETER_KEYS: &[&str] = &[
    "description",
    "datainfo",
    "readonly",
    "pollinterval",
    "constant",
    "group",
    "visibility",
    "meaning",
];
const COMMAND_KEYS: &[&str] = &["description", "datainfo", "visibility", "group"];

/// True if `key` is one of the owner kind's recognised properties.
/// Underscore-prefixed keys are user extensions and are never "unrecognised"
/// regardless of owner kind.
pub fn is_recognised(owner: OwnerKind, key: &str) -> bool {
    if key.starts_with('_') {
        return true;
    }
    let table: &[&str] = match owner {
        OwnerKind::Node => NODE_KEYS,
        OwnerKind::Module => MODULE_KEYS,
        OwnerKind::Parameter => PARAMETER_KEYS,
        OwnerKind::Command => COMMAND_KEYS,
    };
    table.iter().any(|k| k.eq_ignore_ascii_case(key))
}

/// SECoP identifier rule: `^[A-Za-z_][A-Za-z0-9_]{0,62}$`.
pub fn is_valid_identifier(name: &str) -> bool {
    if name.is_empty() || name.len() > 63 {
        return false;
    }
    let mut chars = name.chars();
    let first = match chars.next() {
        Some(c) => c,
        None => return false,
    };
    if !(first.is_ascii_alphabetic() || first == '_') {
        return false;
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn underscore_keys_are_always_recognised() {
        assert!(is_recognised(OwnerKind::Parameter, "_vendor_hint"));
    }

    #[test]
    fn datainfo_only_recognised_for_parameter_and_command() {
        assert!(is_recognised(OwnerKind::Parameter, "datainfo"));
        assert!(is_recognised(OwnerKind::Command, "datainfo"));
        assert!(!is_recognised(OwnerKind::Module, "datainfo"));
        assert!(!is_recognised(OwnerKind::Node, "datainfo"));
    }

    #[test]
    fn identifier_rule() {
        assert!(is_valid_identifier("value"));
        assert!(is_valid_identifier("_private"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("1value"));
        assert!(!is_valid_identifier("bad-name"));
        assert!(!is_valid_identifier(&"a".repeat(64)));
        assert!(is_valid_identifier(&"a".repeat(63)));
    }
}
