// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Public client API surface (§6): the free functions a host process calls
//! to manage remote nodes, layered on top of [`crate::client::session::Session`]
//! (connection management) and [`crate::client::registry`] (node lookup).

use std::time::Duration;

use serde_json::Value as Json;

use crate::{
    client::{
        cache::AccessibleCache,
        error::{ClientError, Result},
        registry,
    },
    variant::value::export_value,
};

/// Default connect/IO timeout (§4.7: "optionally waits up to 2 s for the
/// socket").
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(2);

fn node_id_of(ip: &str, port: u16) -> String {
    format!("{ip}:{port}")
}

/// Connects to `ip:port`, runs `describe` (and, unless `auto_activate` is
/// false, `activate`), and registers the resulting session under a node id
/// derived from the address. Returns that node id.
pub async fn add_node(ip: &str, port: u16, auto_activate: bool) -> Result<String> {
    let node_id = node_id_of(ip, port);
    let addr = format!("{ip}:{port}");
    registry::register(&node_id, &addr, DEFAULT_IO_TIMEOUT, auto_activate).await?;
    Ok(node_id)
}

pub fn remove_node(ip: &str, port: u16) -> Result<()> {
    registry::remove(&node_id_of(ip, port))
}

pub fn list_nodes() -> Vec<String> {
    registry::list()
}

pub async fn list_modules(node_id: &str) -> Result<Vec<String>> {
    let session = registry::get(node_id)?;
    session.with_cache(|cache| Ok(cache.module_names().to_vec())).await
}

pub async fn list_accessibles(node_id: &str, module: &str) -> Result<Vec<String>> {
    let session = registry::get(node_id)?;
    session
        .with_cache(|cache| {
            let m = cache.get(module).ok_or_else(|| ClientError::ModuleNotFound(module.to_string()))?;
            Ok(m.accessible_names().to_vec())
        })
        .await
}

pub async fn node_property(node_id: &str, key: &str) -> Result<Json> {
    let session = registry::get(node_id)?;
    session
        .with_cache(|cache| {
            cache
                .properties
                .get(key)
                .map(export_value)
                .ok_or_else(|| ClientError::PropertyNotFound(key.to_string()))
        })
        .await
}

pub async fn module_property(node_id: &str, module: &str, key: &str) -> Result<Json> {
    let session = registry::get(node_id)?;
    session
        .with_cache(|cache| {
            let m = cache.get(module).ok_or_else(|| ClientError::ModuleNotFound(module.to_string()))?;
            m.properties
                .get(key)
                .map(export_value)
                .ok_or_else(|| ClientError::PropertyNotFound(key.to_string()))
        })
        .await
}

pub async fn accessible_property(node_id: &str, module: &str, accessible: &str, key: &str) -> Result<Json> {
    let session = registry::get(node_id)?;
    session
        .with_cache(|cache| {
            let m = cache.get(module).ok_or_else(|| ClientError::ModuleNotFound(module.to_string()))?;
            let a = m
                .get(accessible)
                .ok_or_else(|| ClientError::AccessibleNotFound(accessible.to_string()))?;
            a.properties()
                .get(key)
                .map(export_value)
                .ok_or_else(|| ClientError::PropertyNotFound(key.to_string()))
        })
        .await
}

/// A parameter's cached reading, wire-exported: `(value, timestamp, sigma)`.
pub type Reading = (Json, Option<f64>, Option<f64>);

fn export_reading(cache: &AccessibleCache) -> Result<Reading> {
    match cache {
        AccessibleCache::Parameter { cache, .. } => {
            let t = cache.timestamp.is_finite().then_some(cache.timestamp);
            Ok((export_value(&cache.value), t, cache.sigma))
        },
        AccessibleCache::Command { .. } => Err(ClientError::NotVariable("command has no reading".into())),
    }
}

/// Returns the cached reading without issuing any wire traffic.
pub async fn read_parameter(node_id: &str, module: &str, param: &str) -> Result<Reading> {
    let session = registry::get(node_id)?;
    session
        .with_cache(|cache| {
            let m = cache.get(module).ok_or_else(|| ClientError::ModuleNotFound(module.to_string()))?;
            let a = m
                .get(param)
                .ok_or_else(|| ClientError::AccessibleNotFound(param.to_string()))?;
            export_reading(a)
        })
        .await
}

/// Issues `read <m>:<p>`, blocks up to `timeout_ms` for the matching
/// `reply`, then returns the (now fresh) cached reading (§4.7).
pub async fn forced_read_parameter(node_id: &str, module: &str, param: &str, timeout_ms: u64) -> Result<Reading> {
    let session = registry::get(node_id)?;
    session.read_parameter(module, param, Duration::from_millis(timeout_ms)).await?;
    session
        .with_cache(|cache| {
            let m = cache.get(module).ok_or_else(|| ClientError::ModuleNotFound(module.to_string()))?;
            let a = m
                .get(param)
                .ok_or_else(|| ClientError::AccessibleNotFound(param.to_string()))?;
            export_reading(a)
        })
        .await
}

/// Blocking round-trip read (§4.7): succeeds only for a variable (non-
/// constant, readable-or-writable) parameter, and times out without
/// cancelling the pending request.
pub async fn test_read(node_id: &str, module: &str, param: &str, timeout_ms: u64) -> Result<()> {
    let session = registry::get(node_id)?;
    session.read_parameter(module, param, Duration::from_millis(timeout_ms)).await
}

pub async fn write_parameter(node_id: &str, module: &str, param: &str, value: Json) -> Result<()> {
    let session = registry::get(node_id)?;
    session.write_parameter(module, param, value).await
}

pub async fn exec_command(node_id: &str, module: &str, command: &str, argument: Json) -> Result<Reading> {
    let session = registry::get(node_id)?;
    let frame = session.invoke_command(module, command, argument).await?;
    let data = frame
        .data
        .ok_or_else(|| ClientError::BadDescriptor("done frame carries no JSON".into()))?;
    let parsed: Json =
        serde_json::from_str(&data).map_err(|e| ClientError::BadDescriptor(format!("done JSON: {e}")))?;
    let pair = parsed
        .as_array()
        .filter(|a| a.len() == 2)
        .ok_or_else(|| ClientError::BadDescriptor("done frame is not a 2-element array".into()))?;
    let (t, e) = crate::client::common::parse_qualifier(&pair[1]);
    Ok((pair[0].clone(), t, e))
}

/// Parses the bracketed `[value,{"t":...,"e":...}]` wire text into a
/// 3-tuple of strings (§4.7/§6), tolerating a missing `t` or `e`.
pub use crate::utils::split_qualifier;
