// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The accessible model (§4.3): parameters (cached value + sigma +
//! timestamp + poll interval) and commands (argument/result types +
//! callback), each backed by the property store and the variant type
//! system.

use std::{future::Future, pin::Pin, sync::Arc};

use serde_json::Value as Json;

use crate::{
    node::protocol::ProtocolError,
    property::{AddPropertyResult, PropertyStore},
    utils::now_fractional_secs,
    variant::{Variant, VariantKind, descriptor::create_from_descriptor, property::OwnerKind, value::import_value},
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The `(errorKind, value, sigma, timestamp)` tuple a getter/setter/command
/// callback produces on success (§4.3).
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub value: Variant,
    pub sigma: Option<f64>,
    pub timestamp: f64,
}

impl Reading {
    pub fn now(value: Variant) -> Self {
        Self {
            value,
            sigma: None,
            timestamp: now_fractional_secs(),
        }
    }

    /// Substitutes the current wall clock for a NaN/infinite timestamp
    /// returned by a callback (§4.3).
    fn normalize(mut self) -> Self {
        if !self.timestamp.is_finite() {
            self.timestamp = now_fractional_secs();
        }
        self
    }
}

pub type ReadResult = Result<Reading, ProtocolError>;
pub type ChangeResult = Result<Reading, ProtocolError>;
pub type DoResult = Result<Reading, ProtocolError>;

pub type Getter = Arc<dyn Fn() -> BoxFuture<'static, ReadResult> + Send + Sync>;
pub type Setter = Arc<dyn Fn(Variant) -> BoxFuture<'static, ChangeResult> + Send + Sync>;
pub type CommandCallback = Arc<dyn Fn(Variant) -> BoxFuture<'static, DoResult> + Send + Sync>;

/// Clamps a `pollinterval` property value (seconds, double or integer) to
/// `[10ms, 3600s]` (§4.2 table).
pub(crate) fn clamp_poll_ms_from_seconds(seconds: f64) -> u64 {
    let ms = (seconds * 1000.0).round();
    let ms = if ms.is_finite() { ms } else { 0.0 };
    (ms as i64).clamp(10, 3_600_000) as u64
}

fn seconds_of(value: &Variant) -> Result<f64, ProtocolError> {
    match &value.kind {
        VariantKind::Double { value, .. } => Ok(*value),
        VariantKind::Int { value, .. } => Ok(*value as f64),
        _ => Err(ProtocolError::InvalidValue(
            "pollinterval must be a number of seconds".into(),
        )),
    }
}

/// A readable and/or writable cached datum (§3 Parameter, §4.3).
pub struct Parameter {
    pub name: String,
    pub writable: bool,
    pub constant: bool,
    pub poll_interval_ms: u64,
    pub properties: PropertyStore,
    /// `Some` once a `datainfo` property has established the parameter's
    /// type; holds the current cached value.
    pub cache: Option<Variant>,
    pub sigma: Option<f64>,
    pub timestamp: f64,
    getter: Option<Getter>,
    setter: Option<Setter>,
}

impl Parameter {
    pub fn new(
        name: &str,
        writable: bool,
        getter: Option<Getter>,
        setter: Option<Setter>,
    ) -> Result<Self, ProtocolError> {
        if !crate::property::is_valid_identifier(name) {
            return Err(ProtocolError::InvalidName(name.to_string()));
        }
        Ok(Self {
            name: name.to_string(),
            writable,
            constant: false,
            poll_interval_ms: 0,
            properties: PropertyStore::new(),
            cache: None,
            sigma: None,
            timestamp: 0.0,
            getter,
            setter,
        })
    }

    pub fn has_getter(&self) -> bool {
        self.getter.is_some()
    }

    pub fn has_setter(&self) -> bool {
        self.setter.is_some()
    }

    /// Applies `add_property(key, value)` (§4.2), including the
    /// `pollinterval`/`datainfo`/`constant` side effects.
    pub fn add_property(&mut self, key: &str, value: Json) -> Result<AddPropertyResult, ProtocolError> {
        match key.to_ascii_lowercase().as_str() {
            "pollinterval" => {
                let v = Variant::from_json_literal(&value);
                let seconds = seconds_of(&v)?;
                let result = self.properties.add(OwnerKind::Parameter, key, v, false);
                self.poll_interval_ms = clamp_poll_ms_from_seconds(seconds);
                Ok(result)
            },
            "datainfo" => {
                let typed = create_from_descriptor(&value)?;
                let result = self
                    .properties
                    .add(OwnerKind::Parameter, key, typed.clone(), false);
                self.cache = Some(typed);
                Ok(result)
            },
            "constant" => {
                let result = self
                    .properties
                    .add(OwnerKind::Parameter, key, Variant::bool(true), false);
                self.constant = true;
                match &mut self.cache {
                    Some(cache) => import_value(cache, &value, true)?,
                    None => self.cache = Some(Variant::from_json_literal(&value)),
                }
                Ok(result)
            },
            _ => {
                let v = Variant::from_json_literal(&value);
                Ok(self.properties.add(OwnerKind::Parameter, key, v, false))
            },
        }
    }

    /// `read(param)` (§4.3): invokes the getter and updates the cache.
    /// `Busy` propagates from re-entrant module callbacks (§5) unchanged.
    pub async fn read(&mut self) -> ReadResult {
        if self.constant {
            return Err(ProtocolError::Constant);
        }
        let Some(getter) = self.getter.clone() else {
            return Err(ProtocolError::NoGetter);
        };
        let reading = (getter)().await?.normalize();
        self.store(reading.clone());
        Ok(reading)
    }

    /// `change(param, value)` (§4.3): validates strictly against the cached
    /// type, invokes the setter, and caches whatever the setter reports as
    /// the effective value (it may clamp).
    pub async fn change(&mut self, value: &Json) -> ChangeResult {
        if self.constant {
            return Err(ProtocolError::Constant);
        }
        if !self.writable {
            return Err(ProtocolError::ReadOnly);
        }
        let Some(setter) = self.setter.clone() else {
            return Err(ProtocolError::NoSetter);
        };
        let mut candidate = self
            .cache
            .clone()
            .ok_or_else(|| ProtocolError::Internal("parameter has no datainfo".into()))?;
        import_value(&mut candidate, value, true)?;
        let reading = (setter)(candidate).await?.normalize();
        self.store(reading.clone());
        Ok(reading)
    }

    fn store(&mut self, reading: Reading) {
        self.cache = Some(reading.value);
        self.sigma = reading.sigma;
        self.timestamp = reading.timestamp;
    }

    /// Snapshot `(value, sigma, timestamp)` for subscription fan-out and
    /// `activate` snapshots (§4.4, §4.6).
    pub fn snapshot(&self) -> Option<Reading> {
        self.cache.as_ref().map(|v| Reading {
            value: v.clone(),
            sigma: self.sigma,
            timestamp: self.timestamp,
        })
    }
}

/// A callable accessible with optional argument/result types (§3 Command).
pub struct Command {
    pub name: String,
    pub properties: PropertyStore,
    pub argument_type: Variant,
    pub result_type: Variant,
    callback: Option<CommandCallback>,
}

impl Command {
    pub fn new(name: &str, callback: Option<CommandCallback>) -> Result<Self, ProtocolError> {
        if !crate::property::is_valid_identifier(name) {
            return Err(ProtocolError::InvalidName(name.to_string()));
        }
        Ok(Self {
            name: name.to_string(),
            properties: PropertyStore::new(),
            argument_type: Variant::null(),
            result_type: Variant::null(),
            callback,
        })
    }

    pub fn has_callback(&self) -> bool {
        self.callback.is_some()
    }

    pub fn add_property(&mut self, key: &str, value: Json) -> Result<AddPropertyResult, ProtocolError> {
        if key.eq_ignore_ascii_case("datainfo") {
            let typed = create_from_descriptor(&value)?;
            let VariantKind::Command { argument, result } = typed.kind else {
                return Err(ProtocolError::InvalidValue(
                    "command datainfo must have type \"command\"".into(),
                ));
            };
            self.argument_type = *argument;
            self.result_type = *result;
            return Ok(self.properties.add(OwnerKind::Command, key, typed, false));
        }
        let v = Variant::from_json_literal(&value);
        Ok(self.properties.add(OwnerKind::Command, key, v, false))
    }

    /// `do(command, arg)` (§4.3): validates `arg`, invokes the callback, and
    /// validates the result.
    pub async fn invoke(&self, arg: Json) -> DoResult {
        let Some(callback) = self.callback.clone() else {
            return Err(ProtocolError::NoSetter);
        };
        let mut argument = self.argument_type.duplicate();
        if !argument.is_null() || !matches!(arg, Json::Null) {
            import_value(&mut argument, &arg, true)?;
        }
        let reading = (callback)(argument).await?.normalize();
        if !self.result_type.is_null() {
            let mut check = self.result_type.duplicate();
            import_value(&mut check, &crate::variant::value::export_value(&reading.value), true)?;
        }
        Ok(reading)
    }
}

/// Either half of a module's ordered accessible list (§3 Module).
pub enum Accessible {
    Parameter(Parameter),
    Command(Command),
}

impl Accessible {
    pub fn name(&self) -> &str {
        match self {
            Accessible::Parameter(p) => &p.name,
            Accessible::Command(c) => &c.name,
        }
    }

    pub fn properties(&self) -> &PropertyStore {
        match self {
            Accessible::Parameter(p) => &p.properties,
            Accessible::Command(c) => &c.properties,
        }
    }

    /// The canonical `datainfo` type descriptor JSON for this accessible
    /// (§4.5 descriptive JSON).
    pub fn datainfo_json(&self) -> Json {
        match self {
            Accessible::Parameter(p) => match &p.cache {
                Some(v) => crate::variant::descriptor::export_type(v),
                None => Json::Null,
            },
            Accessible::Command(c) => {
                let v = Variant {
                    kind: VariantKind::Command {
                        argument: Box::new(c.argument_type.duplicate()),
                        result: Box::new(c.result_type.duplicate()),
                    },
                    additional: serde_json::Map::new(),
                };
                crate::variant::descriptor::export_type(&v)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pollinterval_clamps_to_10ms_floor_and_1h_ceiling() {
        assert_eq!(clamp_poll_ms_from_seconds(0.0), 10);
        assert_eq!(clamp_poll_ms_from_seconds(0.25), 250);
        assert_eq!(clamp_poll_ms_from_seconds(10_000.0), 3_600_000);
    }

    #[tokio::test]
    async fn constant_parameter_rejects_read_and_change() {
        let mut p = Parameter::new("value", true, None, None).unwrap();
        p.add_property("datainfo", serde_json::json!({"type": "double"}))
            .unwrap();
        p.add_property("constant", serde_json::json!(42.0)).unwrap();
        assert!(matches!(p.read().await, Err(ProtocolError::Constant)));
        assert!(matches!(
            p.change(&serde_json::json!(1.0)).await,
            Err(ProtocolError::Constant)
        ));
    }

    #[test]
    fn invalid_identifier_rejected() {
        assert!(Parameter::new("1bad", false, None, None).is_err());
        assert!(Command::new("bad-name", None).is_err());
    }
}
