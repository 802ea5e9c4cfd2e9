// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Process-wide registry of client [`Session`]s (§4.7/§6), mirroring
//! [`crate::node::directory::Directory`] on the server side: a single
//! `once_cell::Lazy` static keyed by node id, so free functions in
//! [`crate::client::api`] don't need a handle threaded through the caller.

use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use once_cell::sync::Lazy;

use crate::client::{
    error::{ClientError, Result},
    session::Session,
};

pub(crate) static REGISTRY: Lazy<DashMap<String, Arc<Session>>> = Lazy::new(DashMap::new);

/// Registers a node under `node_id`, connecting (and running the §4.7
/// `describe`/`activate` handshake, with reconnect back-off if the first
/// dial fails) before returning. Replaces any prior registration under the
/// same id.
pub(crate) async fn register(
    node_id: &str,
    addr: &str,
    io_timeout: Duration,
    auto_activate: bool,
) -> Result<Arc<Session>> {
    let session = Arc::new(Session::new(addr.to_string(), io_timeout, auto_activate));
    session.ensure_connected().await?;
    REGISTRY.insert(node_id.to_string(), session.clone());
    Ok(session)
}

pub(crate) fn get(node_id: &str) -> Result<Arc<Session>> {
    REGISTRY
        .get(node_id)
        .map(|e| e.value().clone())
        .ok_or_else(|| ClientError::NodeNotFound(node_id.to_string()))
}

pub(crate) fn remove(node_id: &str) -> Result<()> {
    REGISTRY
        .remove(node_id)
        .map(|_| ())
        .ok_or_else(|| ClientError::NodeNotFound(node_id.to_string()))
}

pub(crate) fn list() -> Vec<String> {
    REGISTRY.iter().map(|e| e.key().clone()).collect()
}
