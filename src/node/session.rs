// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The session worker (§4.6): a per-connection line parser and
//! request/response/subscription state machine.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use serde_json::{Value as Json, json};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::TcpStream,
    sync::Mutex as AsyncMutex,
};
use tracing::debug;

use crate::node::{
    accessible::Reading,
    directory::{NodeHandle, canonical_specifier, dispatch_change, dispatch_do, dispatch_read},
    module::ParameterUpdate,
    protocol::ProtocolError,
};

const IDN_BANNER: &str = "ISSE&SINE2020,SECoP,V2019-09-16,v1.0";
const HELP_TEXT: &str = "*IDN? describe activate deactivate read change do ping help";

/// Formats the qualifier object `{"t":…,"e":…}` (§4.6). `t` is omitted only
/// when the reading carries no timestamp at all, which in practice never
/// happens once a value has been cached — every reading is stamped at
/// creation (§4.3).
fn qualifier_json(reading: &Reading) -> Json {
    let mut obj = serde_json::Map::new();
    if reading.timestamp.is_finite() {
        obj.insert("t".to_string(), json!(reading.timestamp));
    }
    if let Some(sigma) = reading.sigma {
        obj.insert("e".to_string(), json!(sigma));
    }
    json!(obj)
}

fn qualified_value(reading: &Reading) -> Json {
    json!([crate::variant::value::export_value(&reading.value), qualifier_json(reading)])
}

fn split_specifier(specifier: &str) -> Result<(String, String), ProtocolError> {
    let mut parts = specifier.splitn(2, ':');
    let module = parts.next().unwrap_or_default();
    let accessible = parts
        .next()
        .ok_or_else(|| ProtocolError::InvalidName(specifier.to_string()))?;
    if module.is_empty() || accessible.is_empty() {
        return Err(ProtocolError::InvalidName(specifier.to_string()));
    }
    Ok((module.to_string(), accessible.to_string()))
}

/// A single accepted connection (§4.6). Request parsing, dispatch, and
/// response emission are strictly serialised within one session; only the
/// subscription fan-out task and the reader run concurrently.
pub struct Session {
    id: u64,
    node: Arc<NodeHandle>,
    writer: AsyncMutex<tokio::io::WriteHalf<TcpStream>>,
    active: AtomicBool,
}

impl Session {
    pub async fn run(node: Arc<NodeHandle>, id: u64, stream: TcpStream) {
        let (read_half, write_half) = tokio::io::split(stream);
        let session = Arc::new(Session {
            id,
            node: node.clone(),
            writer: AsyncMutex::new(write_half),
            active: AtomicBool::new(false),
        });

        let mut updates = node.updates.subscribe();
        let fanout_session = session.clone();
        let fanout = tokio::spawn(async move {
            loop {
                match updates.recv().await {
                    Ok(update) => fanout_session.on_update(&update).await,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        let mut lines = BufReader::new(read_half).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let line = line.trim_end_matches('\r');
                    if line.is_empty() {
                        continue;
                    }
                    session.handle_line(line).await;
                },
                Ok(None) => break,
                Err(e) => {
                    debug!("session read error: {e}");
                    break;
                },
            }
        }
        fanout.abort();
    }

    async fn write_line(&self, line: &str) {
        let mut w = self.writer.lock().await;
        if w.write_all(line.as_bytes()).await.is_ok() {
            let _ = w.write_all(b"\n").await;
            let _ = w.flush().await;
        }
    }

    /// Fans out a cache update as `update` (§4.6); suppressed for the
    /// session whose own `change` produced it — that session already got
    /// `changed` instead (§4.6 subscription semantics, §5 ordering guarantee
    /// (c)).
    async fn on_update(&self, update: &ParameterUpdate) {
        if !self.active.load(Ordering::Acquire) {
            return;
        }
        if update.origin == Some(self.id) {
            return;
        }
        let specifier = format!("{}:{}", update.module, update.parameter);
        let line = format!("update {specifier} {}", qualified_value(&update.reading));
        self.write_line(&line).await;
    }

    async fn handle_line(&self, line: &str) {
        let mut fields = line.splitn(3, ' ');
        let action = fields.next().unwrap_or_default();
        let specifier = fields.next();
        let data = fields.next();

        match action.to_ascii_lowercase().as_str() {
            "*idn?" => self.write_line(IDN_BANNER).await,
            "describe" => self.handle_describe().await,
            "activate" => self.handle_activate().await,
            "deactivate" => {
                self.active.store(false, Ordering::Release);
                self.write_line("inactive").await;
            },
            "read" => self.handle_read(specifier).await,
            "change" => self.handle_change(specifier, data).await,
            "do" => self.handle_do(specifier, data).await,
            "ping" => {
                let token = specifier.unwrap_or_default();
                let reply = if token.is_empty() {
                    "pong".to_string()
                } else {
                    format!("pong {token}")
                };
                self.write_line(&reply).await;
            },
            "help" => self.write_line(&format!("commands {HELP_TEXT}")).await,
            _ => self.emit_error(action, specifier, data, ProtocolError::BadProtocol).await,
        }
    }

    async fn emit_error(&self, action: &str, specifier: Option<&str>, data: Option<&str>, err: ProtocolError) {
        let mut echoed = action.to_string();
        if let Some(s) = specifier {
            echoed.push(' ');
            echoed.push_str(s);
        }
        if let Some(d) = data {
            echoed.push(' ');
            echoed.push_str(d);
        }
        let payload = json!([echoed, {"reason": err.to_string()}]);
        self.write_line(&format!("error {} {payload}", err.specifier())).await;
    }

    async fn handle_describe(&self) {
        let describing = self.node.describe().await;
        self.write_line(&format!("describing . {describing}")).await;
    }

    async fn handle_activate(&self) {
        self.active.store(true, Ordering::Release);
        for (module_name, module) in self.node.modules_in_order().await {
            let snapshot = module.lock().await.snapshot_all();
            for (param_name, reading) in snapshot {
                let specifier = format!("{module_name}:{param_name}");
                let line = format!("update {specifier} {}", qualified_value(&reading));
                self.write_line(&line).await;
            }
        }
        self.write_line("active").await;
    }

    async fn handle_read(&self, specifier: Option<&str>) {
        let Some(specifier) = specifier else {
            return self.emit_error("read", specifier, None, ProtocolError::BadProtocol).await;
        };
        let (module, param) = match split_specifier(specifier) {
            Ok(v) => v,
            Err(e) => return self.emit_error("read", Some(specifier), None, e).await,
        };
        match dispatch_read(&self.node.id, &module, &param).await {
            Ok(update) => {
                let echo = format!("{}:{}", update.module, update.parameter);
                let line = format!("reply {echo} {}", qualified_value(&update.reading));
                self.write_line(&line).await;
            },
            Err(e) => self.emit_error("read", Some(specifier), None, e).await,
        }
    }

    async fn handle_change(&self, specifier: Option<&str>, data: Option<&str>) {
        let (Some(specifier), Some(data)) = (specifier, data) else {
            return self.emit_error("change", specifier, data, ProtocolError::BadProtocol).await;
        };
        let (module, param) = match split_specifier(specifier) {
            Ok(v) => v,
            Err(e) => return self.emit_error("change", Some(specifier), Some(data), e).await,
        };
        let value: Json = match serde_json::from_str(data) {
            Ok(v) => v,
            Err(e) => {
                return self
                    .emit_error("change", Some(specifier), Some(data), ProtocolError::BadJson(e.to_string()))
                    .await;
            },
        };
        match dispatch_change(&self.node.id, &module, &param, value, Some(self.id)).await {
            Ok(update) => {
                let echo = format!("{}:{}", update.module, update.parameter);
                let line = format!("changed {echo} {}", qualified_value(&update.reading));
                self.write_line(&line).await;
                // Broadcast only after `changed` has been queued to this
                // session's writer, so another session's `update` for the
                // same change cannot be observed before it (§5 ordering
                // guarantee (c)). `on_update` skips this session itself.
                let _ = self.node.updates.send(update);
            },
            Err(e) => self.emit_error("change", Some(specifier), Some(data), e).await,
        }
    }

    async fn handle_do(&self, specifier: Option<&str>, data: Option<&str>) {
        let Some(specifier) = specifier else {
            return self.emit_error("do", specifier, data, ProtocolError::BadProtocol).await;
        };
        let (module, command) = match split_specifier(specifier) {
            Ok(v) => v,
            Err(e) => return self.emit_error("do", Some(specifier), data, e).await,
        };
        let argument: Json = match data {
            Some(raw) => match serde_json::from_str(raw) {
                Ok(v) => v,
                Err(e) => {
                    return self
                        .emit_error("do", Some(specifier), data, ProtocolError::BadJson(e.to_string()))
                        .await;
                },
            },
            None => Json::Null,
        };
        let canonical = match canonical_specifier(&self.node.id, &module, &command).await {
            Ok(v) => v,
            Err(e) => return self.emit_error("do", Some(specifier), data, e).await,
        };
        match dispatch_do(&self.node.id, &module, &command, argument).await {
            Ok(reading) => {
                let echo = format!("{}:{}", canonical.0, canonical.1);
                let line = format!("done {echo} {}", qualified_value(&reading));
                self.write_line(&line).await;
            },
            Err(e) => self.emit_error("do", Some(specifier), data, e).await,
        }
    }
}
