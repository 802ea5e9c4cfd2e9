// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The process-wide node directory and TCP listener (§4.5): registers
//! nodes, builds descriptive JSON on demand, and drives each module's
//! scheduler. Also hosts external-poll mode's process-wide work list (§6).

use std::{
    collections::VecDeque,
    sync::{
        Arc, Weak,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use dashmap::DashMap;
use once_cell::sync::{Lazy, OnceCell};
use serde_json::{Map, Value as Json, json};
use tokio::{net::TcpListener, sync::Mutex as AsyncMutex, sync::broadcast};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    node::{
        accessible::{Command, Parameter, Reading},
        module::{AccessMode, Module, ParameterUpdate},
        protocol::{ProtocolError, Warning},
        session::Session,
    },
    property::PropertyStore,
    variant::{
        Variant,
        property::{OwnerKind, is_recognised},
    },
};

/// Either the live result of an in-process callback, or the slot an
/// external driver will eventually fill via `put_command_answer` (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Read,
    Change,
    Do,
}

/// A request queued for an external driver because its owning module has
/// no installed callbacks (§4.4 external-poll mode).
#[derive(Debug, Clone)]
pub struct StoredCommand {
    pub id: u64,
    pub node: String,
    pub module: String,
    pub specifier: String,
    pub action: AccessKind,
    pub value: Json,
}

struct PendingAnswer {
    tx: tokio::sync::oneshot::Sender<Result<Reading, ProtocolError>>,
    node: String,
    module: String,
    specifier: String,
}

/// The process-wide external-poll work list (§6): `get_stored_command`
/// dequeues, `put_command_answer` resolves.
#[derive(Default)]
struct ExternalQueue {
    queue: AsyncMutex<VecDeque<StoredCommand>>,
    pending: DashMap<u64, PendingAnswer>,
    next_id: AtomicU64,
}

impl ExternalQueue {
    async fn enqueue(
        &self,
        node: &str,
        module: &str,
        specifier: &str,
        action: AccessKind,
        value: Json,
    ) -> tokio::sync::oneshot::Receiver<Result<Reading, ProtocolError>> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.pending.insert(id, PendingAnswer {
            tx,
            node: node.to_string(),
            module: module.to_string(),
            specifier: specifier.to_string(),
        });
        self.queue.lock().await.push_back(StoredCommand {
            id,
            node: node.to_string(),
            module: module.to_string(),
            specifier: specifier.to_string(),
            action,
            value,
        });
        rx
    }

    async fn pop(&self) -> Option<StoredCommand> {
        self.queue.lock().await.pop_front()
    }

    fn resolve(&self, id: u64, result: Result<Reading, ProtocolError>) -> Option<(String, String, String)> {
        let (_, answer) = self.pending.remove(&id)?;
        let target = (answer.node.clone(), answer.module.clone(), answer.specifier.clone());
        let _ = answer.tx.send(result);
        Some(target)
    }
}

/// A registered node: directory, modules, listener, and session fan-out
/// (§4.5).
pub struct NodeHandle {
    pub id: String,
    pub description: String,
    pub port: u16,
    pub properties: AsyncMutex<PropertyStore>,
    modules: AsyncMutex<Vec<(String, Arc<AsyncMutex<Module>>)>>,
    pub(crate) updates: broadcast::Sender<ParameterUpdate>,
    listener_cancel: CancellationToken,
    sessions: DashMap<u64, ()>,
    session_counter: AtomicU64,
    self_weak: OnceCell<Weak<NodeHandle>>,
    focus_module: AsyncMutex<Option<String>>,
}

/// Pushes `NoDescription`/`CustomProperty` for every property currently
/// stored on one owner (§7), re-derived on demand from `is_recognised`
/// rather than tracked at `add` time.
fn warnings_for(warnings: &mut Vec<Warning>, owner: &str, props: &PropertyStore, kind: OwnerKind) {
    if !props.contains("description") {
        warnings.push(Warning::NoDescription { owner: owner.to_string() });
    }
    for p in props.iter() {
        if !is_recognised(kind, &p.key) {
            warnings.push(Warning::CustomProperty {
                owner: owner.to_string(),
                key: p.key.clone(),
            });
        }
    }
}

impl NodeHandle {
    fn new(id: &str, description: &str, port: u16) -> Arc<Self> {
        let (tx, _rx) = broadcast::channel(1024);
        Arc::new(Self {
            id: id.to_string(),
            description: description.to_string(),
            port,
            properties: AsyncMutex::new(PropertyStore::new()),
            modules: AsyncMutex::new(Vec::new()),
            updates: tx,
            listener_cancel: CancellationToken::new(),
            sessions: DashMap::new(),
            session_counter: AtomicU64::new(0),
            self_weak: OnceCell::new(),
            focus_module: AsyncMutex::new(None),
        })
    }

    fn attach_self(self: &Arc<Self>) {
        let _ = self.self_weak.set(Arc::downgrade(self));
    }

    pub fn handle(&self) -> Option<Arc<NodeHandle>> {
        self.self_weak.get().and_then(Weak::upgrade)
    }

    async fn add_module(&self, name: &str) -> Result<(), ProtocolError> {
        let mut modules = self.modules.lock().await;
        if modules.iter().any(|(n, _)| n.eq_ignore_ascii_case(name)) {
            return Err(ProtocolError::NameAlreadyUsed(name.to_string()));
        }
        modules.push((name.to_string(), Arc::new(AsyncMutex::new(Module::new(name)?))));
        Ok(())
    }

    async fn find_module(&self, name: &str) -> Option<Arc<AsyncMutex<Module>>> {
        self.modules
            .lock()
            .await
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, m)| m.clone())
    }

    pub(crate) async fn modules_in_order(&self) -> Vec<(String, Arc<AsyncMutex<Module>>)> {
        self.modules.lock().await.clone()
    }

    /// Builds the descriptive JSON object (§4.5), modules and accessibles
    /// in declaration order.
    pub async fn describe(&self) -> Json {
        let mut node_obj = Map::new();
        node_obj.insert("equipment_id".to_string(), json!(self.id));
        let props = self.properties.lock().await;
        for p in props.iter() {
            node_obj.insert(p.key.clone(), crate::variant::value::export_value(&p.value));
        }
        drop(props);

        let mut modules_obj = Map::new();
        for (name, module) in self.modules_in_order().await {
            let module = module.lock().await;
            let mut mod_obj = Map::new();
            for p in module.properties.iter() {
                mod_obj.insert(p.key.clone(), crate::variant::value::export_value(&p.value));
            }
            let mut acc_obj = Map::new();
            for acc_name in module.accessible_names() {
                let Some(acc) = module.get(acc_name) else { continue };
                let mut entry = Map::new();
                for p in acc.properties().iter() {
                    entry.insert(p.key.clone(), crate::variant::value::export_value(&p.value));
                }
                entry.insert("datainfo".to_string(), acc.datainfo_json());
                acc_obj.insert(acc_name.clone(), Json::Object(entry));
            }
            mod_obj.insert("accessibles".to_string(), Json::Object(acc_obj));
            modules_obj.insert(name, Json::Object(mod_obj));
        }
        node_obj.insert("modules".to_string(), Json::Object(modules_obj));
        Json::Object(node_obj)
    }

    /// Accumulated construction-time warnings (§7), recomputed on demand
    /// from the current property stores: `NoDescription` for an owner with
    /// no `description`, `CustomProperty` for a stored key that isn't in
    /// the owner kind's recognised table and isn't `_`-prefixed, and
    /// `MissProperties` for a parameter that was declared but never given a
    /// `datainfo` (so it has no cached type to read/change against).
    pub async fn diagnostics(&self) -> Vec<Warning> {
        let mut warnings = Vec::new();
        let props = self.properties.lock().await;
        warnings_for(&mut warnings, &self.id, &props, OwnerKind::Node);
        drop(props);
        for (mod_name, module) in self.modules_in_order().await {
            let module = module.lock().await;
            warnings_for(&mut warnings, &mod_name, &module.properties, OwnerKind::Module);
            for acc_name in module.accessible_names() {
                let Some(acc) = module.get(acc_name) else { continue };
                let owner_path = format!("{mod_name}:{acc_name}");
                match acc {
                    crate::node::accessible::Accessible::Parameter(p) => {
                        warnings_for(&mut warnings, &owner_path, &p.properties, OwnerKind::Parameter);
                        if p.cache.is_none() {
                            warnings.push(Warning::MissProperties {
                                owner: owner_path,
                                keys: vec!["datainfo".to_string()],
                            });
                        }
                    },
                    crate::node::accessible::Accessible::Command(c) => {
                        warnings_for(&mut warnings, &owner_path, &c.properties, OwnerKind::Command);
                    },
                }
            }
        }
        warnings
    }
}

/// The process-wide node registry (§4.5), lazily initialised by
/// [`init_library`].
pub struct Directory {
    nodes: DashMap<String, Arc<NodeHandle>>,
    external: ExternalQueue,
    initialized: std::sync::atomic::AtomicBool,
}

static DIRECTORY: Lazy<Directory> = Lazy::new(|| Directory {
    nodes: DashMap::new(),
    external: ExternalQueue::default(),
    initialized: std::sync::atomic::AtomicBool::new(false),
});

fn directory() -> &'static Directory {
    &DIRECTORY
}

/// `init_library()` (§6). Idempotent; subsequent calls are no-ops.
pub fn init_library() {
    directory().initialized.store(true, Ordering::Release);
}

fn require_initialized() -> Result<(), ProtocolError> {
    if directory().initialized.load(Ordering::Acquire) {
        Ok(())
    } else {
        Err(ProtocolError::NotInitialized)
    }
}

/// `done_library()` (§6): tears down every node.
pub async fn done_library() {
    let ids: Vec<String> = directory().nodes.iter().map(|e| e.key().clone()).collect();
    for id in ids {
        let _ = destroy_node(&id).await;
    }
    directory().initialized.store(false, Ordering::Release);
}

/// `create_node(id, description, port)` (§6): registers the node and binds
/// its TCP listener.
pub async fn create_node(id: &str, description: &str, port: u16) -> Result<(), ProtocolError> {
    require_initialized()?;
    if directory().nodes.contains_key(id) {
        return Err(ProtocolError::NameAlreadyUsed(id.to_string()));
    }
    let node = NodeHandle::new(id, description, port);
    node.attach_self();
    {
        let mut props = node.properties.lock().await;
        props.add(OwnerKind::Node, "description", Variant::from_json_literal(&json!(description)), true);
    }

    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .map_err(|e| ProtocolError::Internal(format!("bind {port}: {e}")))?;
    directory().nodes.insert(id.to_string(), node.clone());
    spawn_listener(node, listener);
    Ok(())
}

fn spawn_listener(node: Arc<NodeHandle>, listener: TcpListener) {
    let cancel = node.listener_cancel.clone();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => {
                            let id = node.session_counter.fetch_add(1, Ordering::Relaxed);
                            node.sessions.insert(id, ());
                            debug!(node = %node.id, %addr, "session accepted");
                            let node = node.clone();
                            tokio::spawn(async move {
                                Session::run(node.clone(), id, stream).await;
                                node.sessions.remove(&id);
                            });
                        },
                        Err(e) => {
                            warn!(node = %node.id, "accept failed: {e}");
                        },
                    }
                },
            }
        }
    });
}

/// `destroy_node(id)` (§6): stops the listener and every module scheduler.
pub async fn destroy_node(id: &str) -> Result<(), ProtocolError> {
    let Some((_, node)) = directory().nodes.remove(id) else {
        return Err(ProtocolError::NodeNotFound(id.to_string()));
    };
    node.listener_cancel.cancel();
    info!(node = %id, "node destroyed");
    Ok(())
}

pub fn get_node(id: &str) -> Option<Arc<NodeHandle>> {
    directory().nodes.get(id).map(|e| e.clone())
}

pub fn list_node_ids() -> Vec<String> {
    directory().nodes.iter().map(|e| e.key().clone()).collect()
}

/// `add_module(node, name)` (§6).
pub async fn add_module(node: &str, name: &str) -> Result<(), ProtocolError> {
    let node = get_node(node).ok_or_else(|| ProtocolError::NodeNotFound(node.to_string()))?;
    node.add_module(name).await
}

async fn with_module<T>(
    node: &str,
    module: &str,
    f: impl FnOnce(&mut Module) -> Result<T, ProtocolError>,
) -> Result<T, ProtocolError> {
    let node = get_node(node).ok_or_else(|| ProtocolError::NodeNotFound(node.to_string()))?;
    let module_handle = node
        .find_module(module)
        .await
        .ok_or_else(|| ProtocolError::ItemNotFound(module.to_string()))?;
    let mut guard = module_handle.lock().await;
    f(&mut guard)
}

/// `add_readable_parameter`/`add_writable_parameter` (§6): callbacks are
/// optional — omitting both puts the module into external-poll mode once
/// `node_complete` finalises it.
pub async fn add_readable_parameter(
    node: &str,
    module: &str,
    name: &str,
    getter: Option<crate::node::accessible::Getter>,
) -> Result<(), ProtocolError> {
    with_module(node, module, |m| {
        m.add_parameter(Parameter::new(name, false, getter, None)?)
    })
    .await
}

pub async fn add_writable_parameter(
    node: &str,
    module: &str,
    name: &str,
    getter: Option<crate::node::accessible::Getter>,
    setter: Option<crate::node::accessible::Setter>,
) -> Result<(), ProtocolError> {
    with_module(node, module, |m| {
        m.add_parameter(Parameter::new(name, true, getter, setter)?)
    })
    .await
}

pub async fn add_command(
    node: &str,
    module: &str,
    name: &str,
    callback: Option<crate::node::accessible::CommandCallback>,
) -> Result<(), ProtocolError> {
    with_module(node, module, |m| m.add_command(Command::new(name, callback)?)).await
}

/// A construction-time cursor (§6 `set_add_focus`): `node`, `node:module`,
/// or `node:module:accessible`.
#[derive(Debug, Clone)]
pub enum AddFocus {
    Node(String),
    Module(String, String),
    Accessible(String, String, String),
}

fn parse_focus(path: &str) -> Result<AddFocus, ProtocolError> {
    let parts: Vec<&str> = path.split(':').collect();
    match parts.as_slice() {
        [node] => Ok(AddFocus::Node(node.to_string())),
        [node, module] => Ok(AddFocus::Module(node.to_string(), module.to_string())),
        [node, module, acc] => Ok(AddFocus::Accessible(node.to_string(), module.to_string(), acc.to_string())),
        _ => Err(ProtocolError::InvalidName(path.to_string())),
    }
}

/// `add_property(key, value)` (§6), applied at whatever `path` names
/// (`node`, `node:module`, or `node:module:accessible`).
pub async fn add_property(path: &str, key: &str, value: Json) -> Result<crate::property::AddPropertyResult, ProtocolError> {
    match parse_focus(path)? {
        AddFocus::Node(node_id) => {
            let node = get_node(&node_id).ok_or(ProtocolError::NodeNotFound(node_id))?;
            let v = Variant::from_json_literal(&value);
            Ok(node.properties.lock().await.add(OwnerKind::Node, key, v, false))
        },
        AddFocus::Module(node_id, module_name) => {
            with_module(&node_id, &module_name, |m| m.add_property(key, value)).await
        },
        AddFocus::Accessible(node_id, module_name, acc_name) => {
            with_module(&node_id, &module_name, |m| {
                match m.get_mut(&acc_name).ok_or_else(|| ProtocolError::ItemNotFound(acc_name.clone()))? {
                    crate::node::accessible::Accessible::Parameter(p) => p.add_property(key, value),
                    crate::node::accessible::Accessible::Command(c) => c.add_property(key, value),
                }
            })
            .await
        },
    }
}

/// `set_add_focus(path)` (§6): validates the path resolves, for callers
/// that want to fail fast before a batch of `add_property` calls. `path` is
/// `node`, `node:module`, or `node:module:accessible`.
pub async fn set_add_focus(path: &str) -> Result<AddFocus, ProtocolError> {
    let focus = parse_focus(path)?;
    match &focus {
        AddFocus::Node(id) => {
            get_node(id).ok_or_else(|| ProtocolError::NodeNotFound(id.clone()))?;
        },
        AddFocus::Module(id, module) => {
            let n = get_node(id).ok_or_else(|| ProtocolError::NodeNotFound(id.clone()))?;
            n.find_module(module).await.ok_or_else(|| ProtocolError::ItemNotFound(module.clone()))?;
        },
        AddFocus::Accessible(id, module, acc) => {
            let n = get_node(id).ok_or_else(|| ProtocolError::NodeNotFound(id.clone()))?;
            let m = n.find_module(module).await.ok_or_else(|| ProtocolError::ItemNotFound(module.clone()))?;
            let guard = m.lock().await;
            guard.get(acc).ok_or_else(|| ProtocolError::ItemNotFound(acc.clone()))?;
        },
    }
    Ok(focus)
}

/// `node_complete(node)` (§6): finalises every module's scheduler and
/// starts its poll loop.
pub async fn node_complete(node_id: &str) -> Result<(), ProtocolError> {
    let node = get_node(node_id).ok_or_else(|| ProtocolError::NodeNotFound(node_id.to_string()))?;
    for (_, module) in node.modules_in_order().await {
        module.lock().await.finalize();
        spawn_module_scheduler(node.clone(), module);
    }
    Ok(())
}

fn spawn_module_scheduler(node: Arc<NodeHandle>, module: Arc<AsyncMutex<Module>>) {
    let cancel = node.listener_cancel.clone();
    tokio::spawn(async move {
        let actual_ms = module.lock().await.actual_poll_ms;
        let mut ticker = tokio::time::interval(Duration::from_millis(actual_ms.max(1)));
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let mut guard = module.lock().await;
                    if guard.access_mode != AccessMode::InProcess {
                        continue;
                    }
                    let elapsed = guard.actual_poll_ms;
                    let due = guard.due_parameters(elapsed);
                    for name in due {
                        match guard.execute_read(&name).await {
                            Ok(update) => {
                                let _ = node.updates.send(update);
                            },
                            Err(ProtocolError::Busy) => {},
                            Err(e) => warn!(module = %guard.name, parameter = %name, "poll failed: {e}"),
                        }
                    }
                },
            }
        }
    });
}

/// Resolves `module:accessible` to their declared (canonical) casing
/// (§4.6: "the response always echoes the canonical (declared) casing"),
/// regardless of how the request specifier was cased.
pub async fn canonical_specifier(
    node_id: &str,
    module_name: &str,
    accessible_name: &str,
) -> Result<(String, String), ProtocolError> {
    let node = get_node(node_id).ok_or_else(|| ProtocolError::NodeNotFound(node_id.to_string()))?;
    let module = node
        .find_module(module_name)
        .await
        .ok_or_else(|| ProtocolError::ItemNotFound(module_name.to_string()))?;
    let guard = module.lock().await;
    let acc = guard
        .get(accessible_name)
        .ok_or_else(|| ProtocolError::ItemNotFound(accessible_name.to_string()))?;
    Ok((guard.name.clone(), acc.name().to_string()))
}

/// Executes `read`/`change`/`do` either in-process or via the external
/// work list, depending on the owning module's [`AccessMode`] (§4.4).
pub async fn dispatch_read(node_id: &str, module_name: &str, param: &str) -> Result<ParameterUpdate, ProtocolError> {
    let node = get_node(node_id).ok_or_else(|| ProtocolError::NodeNotFound(node_id.to_string()))?;
    let module = node
        .find_module(module_name)
        .await
        .ok_or_else(|| ProtocolError::ItemNotFound(module_name.to_string()))?;
    let mode = module.lock().await.access_mode;
    if mode == AccessMode::InProcess {
        let update = module.lock().await.execute_read(param).await?;
        let _ = node.updates.send(update.clone());
        Ok(update)
    } else {
        let (canon_module, canon_param) = {
            let guard = module.lock().await;
            let acc = guard.get(param).ok_or_else(|| ProtocolError::ItemNotFound(param.to_string()))?;
            (guard.name.clone(), acc.name().to_string())
        };
        let rx = directory()
            .external
            .enqueue(node_id, module_name, param, AccessKind::Read, Json::Null)
            .await;
        let reading = rx
            .await
            .map_err(|_| ProtocolError::Internal("external driver dropped request".into()))??;
        let update = ParameterUpdate {
            module: canon_module,
            parameter: canon_param,
            reading,
            origin: None,
            via_change: false,
        };
        let _ = node.updates.send(update.clone());
        Ok(update)
    }
}

/// `change(module, param, value)` (§4.3), dispatched either in-process or
/// via the external work list. `origin` is the requesting session's id, so
/// the caller can suppress its own broadcast echo (§4.6 ordering guarantee
/// (c)); the caller is responsible for broadcasting the returned update only
/// after it has written the `changed` reply.
pub async fn dispatch_change(
    node_id: &str,
    module_name: &str,
    param: &str,
    value: Json,
    origin: Option<u64>,
) -> Result<ParameterUpdate, ProtocolError> {
    let node = get_node(node_id).ok_or_else(|| ProtocolError::NodeNotFound(node_id.to_string()))?;
    let module = node
        .find_module(module_name)
        .await
        .ok_or_else(|| ProtocolError::ItemNotFound(module_name.to_string()))?;
    let mode = module.lock().await.access_mode;
    if mode == AccessMode::InProcess {
        let update = module.lock().await.execute_change(param, &value).await?;
        Ok(ParameterUpdate { origin, ..update })
    } else {
        let (canon_module, canon_param) = {
            let guard = module.lock().await;
            let acc = guard.get(param).ok_or_else(|| ProtocolError::ItemNotFound(param.to_string()))?;
            (guard.name.clone(), acc.name().to_string())
        };
        let rx = directory()
            .external
            .enqueue(node_id, module_name, param, AccessKind::Change, value)
            .await;
        let reading = rx
            .await
            .map_err(|_| ProtocolError::Internal("external driver dropped request".into()))??;
        Ok(ParameterUpdate {
            module: canon_module,
            parameter: canon_param,
            reading,
            origin,
            via_change: true,
        })
    }
}

pub async fn dispatch_do(
    node_id: &str,
    module_name: &str,
    command: &str,
    argument: Json,
) -> Result<Reading, ProtocolError> {
    let node = get_node(node_id).ok_or_else(|| ProtocolError::NodeNotFound(node_id.to_string()))?;
    let module = node
        .find_module(module_name)
        .await
        .ok_or_else(|| ProtocolError::ItemNotFound(module_name.to_string()))?;
    let mode = module.lock().await.access_mode;
    if mode == AccessMode::InProcess {
        module.lock().await.execute_command(command, argument).await
    } else {
        let rx = directory()
            .external
            .enqueue(node_id, module_name, command, AccessKind::Do, argument)
            .await;
        rx.await
            .map_err(|_| ProtocolError::Internal("external driver dropped request".into()))?
    }
}

/// `get_stored_command()` (§6): pops the next queued request for an
/// external driver.
pub async fn get_stored_command() -> Option<StoredCommand> {
    directory().external.pop().await
}

/// `put_command_answer(id, errorKind, value, sigma, timestamp)` (§6): resolves
/// the caller blocked on `dispatch_read`/`dispatch_change`/`dispatch_do`.
/// Broadcasting the resulting update, if any, is that caller's job once it
/// has written its own reply — not this function's.
pub fn put_command_answer(id: u64, result: Result<(Variant, Option<f64>, f64), ProtocolError>) {
    let resolved = result.map(|(value, sigma, timestamp)| Reading { value, sigma, timestamp });
    let _ = directory().external.resolve(id, resolved);
}
