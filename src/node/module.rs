// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The module scheduler (§4.4): an ordered accessible list, per-parameter
//! poll accumulators, and the external-poll/in-process access strategy
//! decided once at `node_complete`.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, Ordering},
};

use serde_json::Value as Json;

use crate::{
    node::{
        accessible::{Accessible, Command, Parameter, Reading},
        protocol::ProtocolError,
    },
    property::PropertyStore,
    variant::property::OwnerKind,
};

pub const MIN_POLL_MS: u64 = 10;
pub const MAX_POLL_MS: u64 = 3_600_000;

/// Decided once at `node_complete` (§4.4) and never switched afterward:
/// whether a module's reads/changes/commands run through installed
/// callbacks ([`AccessMode::InProcess`]), or are queued for an external
/// driver via `get_stored_command`/`put_command_answer` ([`AccessMode::Queued`],
/// §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    InProcess,
    Queued,
}

/// A cache update produced by a poll tick or a direct `read`/`change` (§4.4
/// step 2), ready to fan out to subscribed sessions.
#[derive(Debug, Clone)]
pub struct ParameterUpdate {
    pub module: String,
    pub parameter: String,
    pub reading: Reading,
    /// `Some(session id)` when a `change` on that session produced this
    /// update; the originating session gets `changed` instead and must not
    /// also receive this as `update` (§4.6 subscription semantics).
    pub origin: Option<u64>,
    pub via_change: bool,
}

/// An ordered accessible list with a scheduler (§3 Module, §4.4).
pub struct Module {
    pub name: String,
    pub properties: PropertyStore,
    order: Vec<String>,
    accessibles: HashMap<String, Accessible>,
    /// The module-wide `pollinterval` property, in milliseconds.
    pub wanted_poll_ms: u64,
    /// `min(wanted_poll_ms, min over parameters of pollIntervalMs>0)`,
    /// clamped to `[10, 3600000]`; computed by [`Module::finalize`].
    pub actual_poll_ms: u64,
    pub access_mode: AccessMode,
    accumulators: HashMap<String, u64>,
    busy: AtomicBool,
}

impl Module {
    pub fn new(name: &str) -> Result<Self, ProtocolError> {
        if !crate::property::is_valid_identifier(name) {
            return Err(ProtocolError::InvalidName(name.to_string()));
        }
        Ok(Self {
            name: name.to_string(),
            properties: PropertyStore::new(),
            order: Vec::new(),
            accessibles: HashMap::new(),
            wanted_poll_ms: MAX_POLL_MS,
            actual_poll_ms: MAX_POLL_MS,
            access_mode: AccessMode::Queued,
            accumulators: HashMap::new(),
            busy: AtomicBool::new(false),
        })
    }

    fn key(name: &str) -> String {
        name.to_ascii_lowercase()
    }

    pub fn add_property(&mut self, key: &str, value: Json) -> Result<crate::property::AddPropertyResult, ProtocolError> {
        let v = crate::variant::Variant::from_json_literal(&value);
        Ok(self.properties.add(OwnerKind::Module, key, v, false))
    }

    fn insert(&mut self, name: &str, accessible: Accessible) -> Result<(), ProtocolError> {
        let key = Self::key(name);
        if self.accessibles.contains_key(&key) {
            return Err(ProtocolError::NameAlreadyUsed(name.to_string()));
        }
        self.order.push(name.to_string());
        self.accumulators.insert(key.clone(), 0);
        self.accessibles.insert(key, accessible);
        Ok(())
    }

    pub fn add_parameter(&mut self, parameter: Parameter) -> Result<(), ProtocolError> {
        let name = parameter.name.clone();
        self.insert(&name, Accessible::Parameter(parameter))
    }

    pub fn add_command(&mut self, command: Command) -> Result<(), ProtocolError> {
        let name = command.name.clone();
        self.insert(&name, Accessible::Command(command))
    }

    /// Names in declaration order (§4.5 descriptive JSON requires stable
    /// ordering).
    pub fn accessible_names(&self) -> &[String] {
        &self.order
    }

    pub fn get(&self, name: &str) -> Option<&Accessible> {
        self.accessibles.get(&Self::key(name))
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Accessible> {
        self.accessibles.get_mut(&Self::key(name))
    }

    pub fn parameter_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        match self.get_mut(name)? {
            Accessible::Parameter(p) => Some(p),
            Accessible::Command(_) => None,
        }
    }

    pub fn command(&self, name: &str) -> Option<&Command> {
        match self.get(name)? {
            Accessible::Command(c) => Some(c),
            Accessible::Parameter(_) => None,
        }
    }

    /// Computes `actual_poll_ms` and decides [`AccessMode`] (§4.4). Called
    /// once by `node_complete`; idempotent but not meant to be called twice
    /// with different callback wiring.
    pub fn finalize(&mut self) {
        let mut min_interval = self.wanted_poll_ms.max(MIN_POLL_MS);
        let mut any_callback = false;
        for name in &self.order {
            match self.accessibles.get(&Self::key(name)) {
                Some(Accessible::Parameter(p)) => {
                    if p.poll_interval_ms > 0 {
                        min_interval = min_interval.min(p.poll_interval_ms);
                    }
                    any_callback |= p.has_getter() || p.has_setter();
                },
                Some(Accessible::Command(c)) => any_callback |= c.has_callback(),
                None => {},
            }
        }
        self.actual_poll_ms = min_interval.clamp(MIN_POLL_MS, MAX_POLL_MS);
        self.access_mode = if any_callback {
            AccessMode::InProcess
        } else {
            AccessMode::Queued
        };
    }

    /// Advances every parameter's poll accumulator by `elapsed_ms` and
    /// returns the parameters due for a poll this tick (§4.4 step 1), in
    /// declaration order. A parameter with `poll_interval_ms == 0` is due
    /// whenever the module-wide tick fires.
    pub fn due_parameters(&mut self, elapsed_ms: u64) -> Vec<String> {
        let mut due = Vec::new();
        for name in &self.order {
            let key = Self::key(name);
            let Some(Accessible::Parameter(p)) = self.accessibles.get(&key) else {
                continue;
            };
            if !p.has_getter() || p.constant {
                continue;
            }
            let interval = if p.poll_interval_ms > 0 {
                p.poll_interval_ms
            } else {
                self.actual_poll_ms
            };
            let acc = self.accumulators.entry(key).or_insert(0);
            *acc += elapsed_ms;
            if *acc >= interval {
                *acc = 0;
                due.push(name.clone());
            }
        }
        due
    }

    /// Serialises callback invocations per module (§5): a re-entrant call
    /// while one is outstanding returns `Busy` rather than blocking.
    fn enter(&self) -> Result<(), ProtocolError> {
        if self.busy.swap(true, Ordering::AcqRel) {
            return Err(ProtocolError::Busy);
        }
        Ok(())
    }

    fn leave(&self) {
        self.busy.store(false, Ordering::Release);
    }

    pub async fn execute_read(&mut self, parameter: &str) -> Result<ParameterUpdate, ProtocolError> {
        self.enter()?;
        let result = async {
            let p = self
                .parameter_mut(parameter)
                .ok_or_else(|| ProtocolError::ItemNotFound(parameter.to_string()))?;
            let name = p.name.clone();
            p.read().await.map(|reading| (name, reading))
        }
        .await;
        self.leave();
        result.map(|(name, reading)| ParameterUpdate {
            module: self.name.clone(),
            parameter: name,
            reading,
            origin: None,
            via_change: false,
        })
    }

    pub async fn execute_change(&mut self, parameter: &str, value: &Json) -> Result<ParameterUpdate, ProtocolError> {
        self.enter()?;
        let result = async {
            let p = self
                .parameter_mut(parameter)
                .ok_or_else(|| ProtocolError::ItemNotFound(parameter.to_string()))?;
            let name = p.name.clone();
            p.change(value).await.map(|reading| (name, reading))
        }
        .await;
        self.leave();
        result.map(|(name, reading)| ParameterUpdate {
            module: self.name.clone(),
            parameter: name,
            reading,
            origin: None,
            via_change: true,
        })
    }

    pub async fn execute_command(&self, command: &str, argument: Json) -> Result<Reading, ProtocolError> {
        self.enter()?;
        let result = async {
            let c = self
                .command(command)
                .ok_or_else(|| ProtocolError::ItemNotFound(command.to_string()))?;
            c.invoke(argument).await
        }
        .await;
        self.leave();
        result
    }

    /// Snapshot of every readable parameter for an `activate` reply (§4.6).
    pub fn snapshot_all(&self) -> Vec<(String, Reading)> {
        self.order
            .iter()
            .filter_map(|name| match self.accessibles.get(&Self::key(name)) {
                Some(Accessible::Parameter(p)) => p.snapshot().map(|r| (name.clone(), r)),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module_with_two_parameters() -> Module {
        let mut m = Module::new("motor").unwrap();
        let mut fast = Parameter::new("value", true, None, None).unwrap();
        fast.add_property("datainfo", serde_json::json!({"type": "double"})).unwrap();
        fast.add_property("pollinterval", serde_json::json!(0.01)).unwrap();
        m.add_parameter(fast).unwrap();
        let mut slow = Parameter::new("status", false, None, None).unwrap();
        slow.add_property("datainfo", serde_json::json!({"type": "int"})).unwrap();
        slow.add_property("pollinterval", serde_json::json!(1.0)).unwrap();
        m.add_parameter(slow).unwrap();
        m
    }

    #[test]
    fn actual_poll_ms_is_fastest_parameter_without_a_getter_excluded() {
        let mut m = module_with_two_parameters();
        m.finalize();
        assert_eq!(m.actual_poll_ms, 10);
        assert_eq!(m.access_mode, AccessMode::Queued);
    }

    #[test]
    fn due_parameters_fire_on_their_own_cadence() {
        let mut m = module_with_two_parameters();
        m.finalize();
        // Neither parameter has a getter in this test, so nothing is due
        // even though accumulators would otherwise overflow; due_parameters
        // only considers parameters with an installed getter.
        assert!(m.due_parameters(1000).is_empty());
    }

    #[test]
    fn duplicate_accessible_name_rejected() {
        let mut m = Module::new("motor").unwrap();
        m.add_parameter(Parameter::new("value", false, None, None).unwrap()).unwrap();
        let dup = Parameter::new("value", false, None, None).unwrap();
        assert!(matches!(m.add_parameter(dup), Err(ProtocolError::NameAlreadyUsed(_))));
    }
}
