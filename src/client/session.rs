// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The client session state machine (§4.7): `Describing` → `Activating` →
//! `Connected`, with transport-error-triggered `Reconnect` back-off and a
//! blocking `test_read` built on top of the asynchronous connection.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use serde_json::Value as Json;
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    client::{
        cache::{AccessibleCache, NodeCache, parse_descriptive},
        common::parse_qualifier,
        connection::{ClientConnection, Frame},
        error::{ClientError, Result},
    },
    variant::value::import_value,
};

/// Geometric reconnect back-off (§4.7): "approximately `{0.5, 1, 5, 10, 20,
/// 30}` seconds". The schedule's length is shorter than the 100-try cap; per
/// Design Note 9(c) the contract is the try *count*, so attempts past the
/// table's end repeat its last entry rather than escalating further.
const BACKOFF_SECS: [f64; 6] = [0.5, 1.0, 5.0, 10.0, 20.0, 30.0];
const MAX_RECONNECT_ATTEMPTS: u32 = 100;

fn backoff_delay(attempt: u32) -> Duration {
    let idx = (attempt as usize).min(BACKOFF_SECS.len() - 1);
    Duration::from_secs_f64(BACKOFF_SECS[idx])
}

fn split_specifier(specifier: &str) -> Option<(&str, &str)> {
    let mut parts = specifier.splitn(2, ':');
    let module = parts.next()?;
    let accessible = parts.next()?;
    if module.is_empty() || accessible.is_empty() {
        return None;
    }
    Some((module, accessible))
}

fn apply_frame_to_cache(cache: &mut NodeCache, frame: &Frame) {
    let action = frame.action.to_ascii_lowercase();
    if !matches!(action.as_str(), "update" | "changed" | "reply" | "done") {
        return;
    }
    let Some((module_name, acc_name)) = frame.specifier.as_deref().and_then(split_specifier) else {
        return;
    };
    let Some(data) = frame.data.as_deref() else { return };
    let Ok(parsed) = serde_json::from_str::<Json>(data) else { return };
    let Some(pair) = parsed.as_array().filter(|a| a.len() == 2) else { return };

    let Some(module) = cache.get_mut(module_name) else { return };
    let Some(AccessibleCache::Parameter { cache: pcache, .. }) = module.get_mut(acc_name) else {
        return;
    };

    let mut value = pcache.value.duplicate();
    if import_value(&mut value, &pair[0], true).is_err() {
        return;
    }
    let (t, e) = parse_qualifier(&pair[1]);
    pcache.apply(value, e, t);
}

enum Phase {
    Disconnected,
    Connected,
    Rejected,
}

struct SessionInner {
    conn: Option<std::sync::Arc<ClientConnection>>,
    cache: Option<NodeCache>,
    phase: Phase,
}

/// A client's view of one remote node. Reconnects transparently; callers
/// only ever see `ClientError::Rejected` once the back-off schedule is
/// exhausted.
pub struct Session {
    pub addr: String,
    pub io_timeout: Duration,
    pub auto_activate: bool,
    inner: AsyncMutex<SessionInner>,
    connecting: AtomicBool,
}

impl Session {
    pub fn new(addr: String, io_timeout: Duration, auto_activate: bool) -> Self {
        Self {
            addr,
            io_timeout,
            auto_activate,
            inner: AsyncMutex::new(SessionInner { conn: None, cache: None, phase: Phase::Disconnected }),
            connecting: AtomicBool::new(false),
        }
    }

    pub async fn node_id(&self) -> Option<String> {
        self.inner.lock().await.cache.as_ref().map(|c| c.id.clone())
    }

    /// Dials once, runs `describe`/`activate`, and spawns the cache-update
    /// consumer for the resulting connection. Does not retry; callers that
    /// want the reconnect schedule use [`Session::ensure_connected`].
    async fn dial_once(self: &Arc<Self>) -> Result<()> {
        let cancel = CancellationToken::new();
        let (conn, mut unsolicited) = ClientConnection::connect(&self.addr, self.io_timeout, cancel).await?;

        let describe_key = "describing .".to_string();
        let reply = conn.request(describe_key, "describe", self.io_timeout).await?;
        let data = reply
            .data
            .ok_or_else(|| ClientError::BadDescriptor("describing frame carries no JSON".into()))?;
        let json: Json = serde_json::from_str(&data)
            .map_err(|e| ClientError::BadDescriptor(format!("describing JSON: {e}")))?;
        let node_id = json
            .get("equipment_id")
            .and_then(Json::as_str)
            .unwrap_or(&self.addr)
            .to_string();
        let mut cache = parse_descriptive(&node_id, &json)?;

        if self.auto_activate {
            let active_key = "active .".to_string();
            conn.request(active_key, "activate", self.io_timeout).await?;
        }

        // Drain whatever is already buffered (the `update` snapshot burst,
        // possibly the `active` echo itself) before handing control to the
        // background consumer, so a `test_read` issued right after this
        // call observes the snapshot per §4.7 scenario 6.
        while let Ok(frame) = unsolicited.try_recv() {
            apply_frame_to_cache(&mut cache, &frame);
        }

        {
            let mut inner = self.inner.lock().await;
            inner.conn = Some(conn);
            inner.cache = Some(cache);
            inner.phase = Phase::Connected;
        }

        let this = self.clone();
        tokio::spawn(async move {
            while let Some(frame) = unsolicited.recv().await {
                let mut inner = this.inner.lock().await;
                if let Some(cache) = inner.cache.as_mut() {
                    apply_frame_to_cache(cache, &frame);
                }
            }
        });

        Ok(())
    }

    /// Ensures a live connection, retrying with the §4.7 back-off schedule
    /// if none is current. Only one caller actually dials; concurrent
    /// callers wait on the same attempt via the `connecting` gate.
    pub async fn ensure_connected(self: &Arc<Self>) -> Result<()> {
        if self.inner.lock().await.conn.is_some() {
            return Ok(());
        }
        if self
            .connecting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ClientError::ConnectionLost);
        }
        let result = self.reconnect_loop().await;
        self.connecting.store(false, Ordering::Release);
        result
    }

    async fn reconnect_loop(self: &Arc<Self>) -> Result<()> {
        for attempt in 0..MAX_RECONNECT_ATTEMPTS {
            match self.dial_once().await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    debug!("node {} reconnect attempt {attempt} failed: {e}", self.addr);
                    tokio::time::sleep(backoff_delay(attempt)).await;
                },
            }
        }
        self.inner.lock().await.phase = Phase::Rejected;
        Err(ClientError::Rejected)
    }

    async fn drop_connection(&self, reason: &ClientError) {
        let mut inner = self.inner.lock().await;
        if let Some(conn) = inner.conn.take() {
            conn.cancel();
        }
        inner.phase = Phase::Disconnected;
        warn!("node {} connection lost: {reason}", self.addr);
    }

    pub async fn with_cache<T>(self: &Arc<Self>, f: impl FnOnce(&NodeCache) -> Result<T>) -> Result<T> {
        self.ensure_connected().await?;
        let inner = self.inner.lock().await;
        let cache = inner.cache.as_ref().ok_or(ClientError::ConnectionLost)?;
        f(cache)
    }

    async fn send_request(self: &Arc<Self>, key: String, line: &str, timeout: Duration) -> Result<Frame> {
        self.ensure_connected().await?;
        let conn = {
            let inner = self.inner.lock().await;
            inner.conn.clone().ok_or(ClientError::ConnectionLost)?
        };
        match conn.request(key, line, timeout).await {
            Ok(frame) => Ok(frame),
            Err(e @ (ClientError::ConnectionLost | ClientError::Internal(_))) => {
                self.drop_connection(&e).await;
                Err(e)
            },
            Err(e) => Err(e),
        }
    }

    /// `read <m>:<p>` / blocking `test_read` (§4.7). Rejects constant or
    /// otherwise non-variable parameters before ever touching the socket.
    pub async fn read_parameter(self: &Arc<Self>, module: &str, param: &str, timeout: Duration) -> Result<()> {
        self.with_cache(|cache| {
            let m = cache.get(module).ok_or_else(|| ClientError::ModuleNotFound(module.to_string()))?;
            let a = m
                .get(param)
                .ok_or_else(|| ClientError::AccessibleNotFound(param.to_string()))?;
            if !a.is_variable() {
                return Err(ClientError::NotVariable(format!("{module}:{param}")));
            }
            Ok(())
        })
        .await?;

        let specifier = format!("{module}:{param}");
        let key = format!("reply {specifier}");
        let line = format!("read {specifier}");
        self.send_request(key, &line, timeout).await.map(|_| ())
    }

    pub async fn write_parameter(self: &Arc<Self>, module: &str, param: &str, value: Json) -> Result<()> {
        let specifier = format!("{module}:{param}");
        let key = format!("changed {specifier}");
        let line = format!("change {specifier} {value}");
        self.send_request(key, &line, self.io_timeout).await?;
        Ok(())
    }

    pub async fn invoke_command(self: &Arc<Self>, module: &str, command: &str, argument: Json) -> Result<Frame> {
        let specifier = format!("{module}:{command}");
        let key = format!("done {specifier}");
        let line = if argument.is_null() {
            format!("do {specifier}")
        } else {
            format!("do {specifier} {argument}")
        };
        self.send_request(key, &line, self.io_timeout).await
    }
}
