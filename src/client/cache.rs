// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The client-side mirror of a server's descriptive JSON (§4.7): node,
//! module, and accessible property stores populated from `describe`, plus
//! the per-parameter value cache that `update`/`changed`/`reply` frames
//! keep current.

use serde_json::Value as Json;

use crate::{
    client::error::{ClientError, Result},
    property::PropertyStore,
    variant::{Variant, VariantKind, descriptor::create_from_descriptor, property::OwnerKind},
};

/// A parameter's cached reading (§3 `SessionState`). `init=true` until the
/// first live `update`/`changed`/`reply` replaces the placeholder default
/// value `create_from_descriptor` produced at `describe` time (§4.7
/// scenario 6: a blocking read issued right after `activate` must observe
/// the snapshot burst, not this placeholder).
#[derive(Debug, Clone)]
pub struct ParamCache {
    pub value: Variant,
    pub sigma: Option<f64>,
    pub timestamp: f64,
    pub init: bool,
}

impl ParamCache {
    fn placeholder(value: Variant) -> Self {
        Self {
            value,
            sigma: None,
            timestamp: f64::NAN,
            init: true,
        }
    }

    pub(crate) fn apply(&mut self, value: Variant, sigma: Option<f64>, timestamp: Option<f64>) {
        self.value = value;
        self.sigma = sigma;
        self.timestamp = timestamp.unwrap_or(f64::NAN);
        self.init = false;
    }
}

/// A cached parameter or command mirrored from descriptive JSON.
pub enum AccessibleCache {
    Parameter {
        writable: bool,
        constant: bool,
        properties: PropertyStore,
        cache: ParamCache,
    },
    Command {
        argument_type: Variant,
        result_type: Variant,
        properties: PropertyStore,
    },
}

impl AccessibleCache {
    pub fn properties(&self) -> &PropertyStore {
        match self {
            AccessibleCache::Parameter { properties, .. } => properties,
            AccessibleCache::Command { properties, .. } => properties,
        }
    }

    /// True for a parameter that is neither constant nor otherwise frozen —
    /// the only kind `test_read` (§4.7) is allowed to issue a `read`
    /// against.
    pub fn is_variable(&self) -> bool {
        matches!(self, AccessibleCache::Parameter { constant: false, .. })
    }
}

pub struct ModuleCache {
    pub properties: PropertyStore,
    order: Vec<String>,
    accessibles: std::collections::HashMap<String, AccessibleCache>,
}

impl ModuleCache {
    pub fn accessible_names(&self) -> &[String] {
        &self.order
    }

    pub fn get(&self, name: &str) -> Option<&AccessibleCache> {
        self.accessibles.get(&name.to_ascii_lowercase())
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut AccessibleCache> {
        self.accessibles.get_mut(&name.to_ascii_lowercase())
    }
}

pub struct NodeCache {
    pub id: String,
    pub properties: PropertyStore,
    order: Vec<String>,
    modules: std::collections::HashMap<String, ModuleCache>,
}

impl NodeCache {
    pub fn module_names(&self) -> &[String] {
        &self.order
    }

    pub fn get(&self, name: &str) -> Option<&ModuleCache> {
        self.modules.get(&name.to_ascii_lowercase())
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ModuleCache> {
        self.modules.get_mut(&name.to_ascii_lowercase())
    }
}

/// Parses the JSON payload of a `describing . <json>` frame into a
/// [`NodeCache`] (§4.7): instantiates a [`Variant`] for every accessible's
/// `datainfo` and populates property stores for node/modules/accessibles,
/// exactly mirroring [`crate::node::directory::NodeHandle::describe`]'s
/// shape.
pub fn parse_descriptive(node_id: &str, json: &Json) -> Result<NodeCache> {
    let root = json
        .as_object()
        .ok_or_else(|| ClientError::BadDescriptor("descriptive JSON is not an object".into()))?;

    let mut node_properties = PropertyStore::new();
    for (key, value) in root {
        if key == "modules" {
            continue;
        }
        node_properties.add(OwnerKind::Node, key, Variant::from_json_literal(value), false);
    }

    let modules_json = root
        .get("modules")
        .and_then(Json::as_object)
        .ok_or_else(|| ClientError::BadDescriptor("missing \"modules\" object".into()))?;

    let mut order = Vec::with_capacity(modules_json.len());
    let mut modules = std::collections::HashMap::with_capacity(modules_json.len());
    for (mod_name, mod_json) in modules_json {
        let module = parse_module(mod_json)?;
        order.push(mod_name.clone());
        modules.insert(mod_name.to_ascii_lowercase(), module);
    }

    Ok(NodeCache {
        id: node_id.to_string(),
        properties: node_properties,
        order,
        modules,
    })
}

fn parse_module(mod_json: &Json) -> Result<ModuleCache> {
    let obj = mod_json
        .as_object()
        .ok_or_else(|| ClientError::BadDescriptor("module descriptor is not an object".into()))?;

    let mut properties = PropertyStore::new();
    for (key, value) in obj {
        if key == "accessibles" {
            continue;
        }
        properties.add(OwnerKind::Module, key, Variant::from_json_literal(value), false);
    }

    let acc_json = obj
        .get("accessibles")
        .and_then(Json::as_object)
        .ok_or_else(|| ClientError::BadDescriptor("missing \"accessibles\" object".into()))?;

    let mut order = Vec::with_capacity(acc_json.len());
    let mut accessibles = std::collections::HashMap::with_capacity(acc_json.len());
    for (acc_name, entry_json) in acc_json {
        let accessible = parse_accessible(entry_json)?;
        order.push(acc_name.clone());
        accessibles.insert(acc_name.to_ascii_lowercase(), accessible);
    }

    Ok(ModuleCache {
        properties,
        order,
        accessibles,
    })
}

fn parse_accessible(entry_json: &Json) -> Result<AccessibleCache> {
    let obj = entry_json
        .as_object()
        .ok_or_else(|| ClientError::BadDescriptor("accessible descriptor is not an object".into()))?;

    let datainfo = obj
        .get("datainfo")
        .ok_or_else(|| ClientError::BadDescriptor("accessible is missing \"datainfo\"".into()))?;
    let typed = create_from_descriptor(datainfo)?;

    let mut properties = PropertyStore::new();
    for (key, value) in obj {
        if key == "datainfo" {
            continue;
        }
        properties.add(OwnerKind::Parameter, key, Variant::from_json_literal(value), false);
    }

    if let VariantKind::Command { argument, result } = typed.kind {
        return Ok(AccessibleCache::Command {
            argument_type: *argument,
            result_type: *result,
            properties,
        });
    }

    let writable = properties
        .get("readonly")
        .map(|v| !matches!(v.kind, VariantKind::Bool(true)))
        .unwrap_or(true);
    let constant = properties.contains("constant");

    Ok(AccessibleCache::Parameter {
        writable,
        constant,
        properties,
        cache: ParamCache::placeholder(typed),
    })
}
