// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! A single TCP connection to a SECoP node (§4.7): a line reader/writer
//! pair in the shape of [`crate::node::session::Session`], but driven from
//! the client side — every inbound frame is pushed to an unsolicited-frame
//! channel for cache maintenance, and additionally wakes a pending request
//! if one is waiting for it.

use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::{Mutex as AsyncMutex, mpsc, oneshot},
};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::client::{
    common::io_with_timeout,
    error::{ClientError, Result},
};

/// A single parsed line: `<action> [<specifier> [<data>]]` (§4.6/§4.7).
#[derive(Debug, Clone)]
pub struct Frame {
    pub action: String,
    pub specifier: Option<String>,
    pub data: Option<String>,
}

impl Frame {
    fn parse(line: &str) -> Self {
        let mut fields = line.splitn(3, ' ');
        let action = fields.next().unwrap_or_default().to_string();
        let specifier = fields.next().map(str::to_string);
        let data = fields.next().map(str::to_string);
        Frame { action, specifier, data }
    }

    /// The key a pending request was registered under: the reply action
    /// this frame answers, paired with its specifier. `describe`/`activate`
    /// answers have no specifier, so `.` stands in (mirrors the server's
    /// own use of `.` for the node-level specifier in `describing . ...`).
    pub(crate) fn request_key(&self) -> String {
        format!("{} {}", self.action, self.specifier.as_deref().unwrap_or("."))
    }

    /// For an `error` frame, recovers the key of the request it answers by
    /// parsing the echoed `<action> [<specifier> ...]` text the server
    /// emitter writes as the first element of its payload array (§4.6
    /// `emit_error`), then maps the echoed action to the reply action a
    /// pending request was registered under.
    fn error_echo_key(&self) -> Option<String> {
        let data = self.data.as_deref()?;
        let payload: serde_json::Value = serde_json::from_str(data).ok()?;
        let echoed = payload.as_array()?.first()?.as_str()?;
        let mut fields = echoed.splitn(3, ' ');
        let echoed_action = fields.next()?.to_ascii_lowercase();
        let echoed_specifier = fields.next();
        let reply_action = match echoed_action.as_str() {
            "read" => "reply",
            "change" => "changed",
            "do" => "done",
            "describe" => "describing",
            "activate" => "active",
            _ => return None,
        };
        Some(format!("{reply_action} {}", echoed_specifier.unwrap_or(".")))
    }

    fn error_reason(&self) -> String {
        self.data
            .as_deref()
            .and_then(|d| serde_json::from_str::<serde_json::Value>(d).ok())
            .and_then(|v| v.as_array()?.get(1)?.get("reason")?.as_str().map(str::to_string))
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// A live connection to one node. Owns the socket; knows nothing about
/// descriptive JSON or the value cache — that's [`crate::client::session`].
pub struct ClientConnection {
    writer: AsyncMutex<OwnedWriteHalf>,
    pending: DashMap<String, oneshot::Sender<Frame>>,
    io_timeout: Duration,
    cancel: CancellationToken,
}

impl ClientConnection {
    /// Dials `addr`, spawns the read loop, and returns the connection plus
    /// the channel every inbound frame (solicited or not) is mirrored onto
    /// for cache maintenance.
    pub async fn connect(
        addr: &str,
        io_timeout: Duration,
        cancel: CancellationToken,
    ) -> Result<(Arc<Self>, mpsc::UnboundedReceiver<Frame>)> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| ClientError::Internal(format!("connect {addr}: {e}")))?;
        stream
            .set_nodelay(true)
            .map_err(|e| ClientError::Internal(format!("set_nodelay: {e}")))?;

        let (r, w) = stream.into_split();
        let (unsolicited_tx, unsolicited_rx) = mpsc::unbounded_channel();

        let conn = Arc::new(Self {
            writer: AsyncMutex::new(w),
            pending: DashMap::new(),
            io_timeout,
            cancel,
        });

        let reader = conn.clone();
        tokio::spawn(async move {
            if let Err(e) = reader.read_loop(r, unsolicited_tx).await {
                debug!("client read loop ended: {e}");
            }
        });

        Ok((conn, unsolicited_rx))
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub async fn write_line(&self, line: &str) -> Result<()> {
        let mut w = self.writer.lock().await;
        io_with_timeout("write line", w.write_all(line.as_bytes()), self.io_timeout, &self.cancel)
            .await
            .map_err(|e| ClientError::Internal(e.to_string()))?;
        io_with_timeout("write newline", w.write_all(b"\n"), self.io_timeout, &self.cancel)
            .await
            .map_err(|e| ClientError::Internal(e.to_string()))?;
        w.flush().await.map_err(|e| ClientError::Internal(e.to_string()))
    }

    /// Registers a waiter for `key` (the reply action + specifier a
    /// request expects, see [`Frame::request_key`]), sends `line`, then
    /// awaits the reply up to `timeout`. On timeout the waiter slot is
    /// dropped but the frame, once it does arrive, still reaches the
    /// unsolicited channel and updates the cache — only this particular
    /// caller gives up.
    pub async fn request(&self, key: String, line: &str, timeout: Duration) -> Result<Frame> {
        let (tx, rx) = oneshot::channel();
        self.pending.insert(key.clone(), tx);

        if let Err(e) = self.write_line(line).await {
            self.pending.remove(&key);
            return Err(e);
        }

        tokio::select! {
            _ = self.cancel.cancelled() => {
                self.pending.remove(&key);
                Err(ClientError::ConnectionLost)
            },
            res = tokio::time::timeout(timeout, rx) => {
                match res {
                    Ok(Ok(frame)) if frame.action.eq_ignore_ascii_case("error") => {
                        Err(ClientError::ServerError {
                            specifier: frame.specifier.clone().unwrap_or_default(),
                            reason: frame.error_reason(),
                        })
                    },
                    Ok(Ok(frame)) => Ok(frame),
                    Ok(Err(_)) => Err(ClientError::ConnectionLost),
                    Err(_) => {
                        self.pending.remove(&key);
                        Err(ClientError::Timeout)
                    },
                }
            }
        }
    }

    async fn read_loop(
        self: Arc<Self>,
        r: OwnedReadHalf,
        unsolicited: mpsc::UnboundedSender<Frame>,
    ) -> Result<()> {
        let mut lines = BufReader::new(r).lines();
        loop {
            let line = tokio::select! {
                _ = self.cancel.cancelled() => return Err(ClientError::ConnectionLost),
                res = lines.next_line() => res.map_err(|e| ClientError::Internal(e.to_string()))?,
            };
            let Some(line) = line else {
                return Err(ClientError::ConnectionLost);
            };
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            let frame = Frame::parse(line);
            let key = if frame.action.eq_ignore_ascii_case("error") {
                frame.error_echo_key().unwrap_or_else(|| frame.request_key())
            } else {
                frame.request_key()
            };
            if let Some((_, tx)) = self.pending.remove(&key) {
                let _ = tx.send(frame.clone());
            }
            if unsolicited.send(frame).is_err() {
                return Ok(());
            }
        }
    }
}
