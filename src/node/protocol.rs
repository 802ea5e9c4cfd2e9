// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Wire error classes and construction-time warnings (§7). Each
//! [`ProtocolError`] variant's [`ProtocolError::specifier`] is the single
//! source of truth for the token written into an `error <specifier> ...`
//! frame (§4.6), so the emitter and any test asserting on wire text agree by
//! construction.

use thiserror::Error;

use crate::variant::VariantError;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProtocolError {
    #[error("library not initialized")]
    NotInitialized,

    #[error("malformed request line or unknown action")]
    BadProtocol,

    #[error("invalid JSON: {0}")]
    BadJson(String),

    #[error("invalid identifier: {0}")]
    InvalidName(String),

    #[error("name already used: {0}")]
    NameAlreadyUsed(String),

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("parameter is read-only")]
    ReadOnly,

    #[error("no getter installed for this parameter")]
    NoGetter,

    #[error("no setter installed for this parameter")]
    NoSetter,

    #[error("parameter is constant")]
    Constant,

    #[error("timeout waiting for a response")]
    Timeout,

    #[error("module is busy executing another request")]
    Busy,

    #[error("item not found: {0}")]
    ItemNotFound(String),

    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ProtocolError {
    /// The wire token written as the `error` frame's specifier (§4.6, §7).
    pub fn specifier(&self) -> &'static str {
        match self {
            ProtocolError::NotInitialized => "NotInitialized",
            ProtocolError::BadProtocol => "BadProtocol",
            ProtocolError::BadJson(_) => "BadJSON",
            ProtocolError::InvalidName(_) => "InvalidName",
            ProtocolError::NameAlreadyUsed(_) => "NameAlreadyUsed",
            ProtocolError::InvalidValue(_) => "InvalidValue",
            ProtocolError::ReadOnly => "ReadOnly",
            ProtocolError::NoGetter => "NoGetter",
            ProtocolError::NoSetter => "NoSetter",
            ProtocolError::Constant => "Constant",
            ProtocolError::Timeout => "Timeout",
            ProtocolError::Busy => "Busy",
            ProtocolError::ItemNotFound(_) => "ItemNotFound",
            ProtocolError::NodeNotFound(_) => "NodeNotFound",
            ProtocolError::Internal(_) => "Internal",
        }
    }
}

impl From<VariantError> for ProtocolError {
    fn from(e: VariantError) -> Self {
        match e {
            VariantError::InvalidType(msg) => ProtocolError::InvalidValue(msg),
            VariantError::InvalidValue(msg) => ProtocolError::InvalidValue(msg),
            VariantError::OutOfBounds { value, min, max } => {
                ProtocolError::InvalidValue(format!("{value} out of bounds [{min}, {max}]"))
            },
            VariantError::BoundConflict(msg) => ProtocolError::InvalidValue(msg),
            VariantError::NoSuchPosition(pos) => {
                ProtocolError::Internal(format!("no such position {pos}"))
            },
            VariantError::KindMismatch(pos) => {
                ProtocolError::Internal(format!("kind mismatch at position {pos}"))
            },
        }
    }
}

/// Construction-time warnings (§7), recomputed on demand from the node's
/// current property stores and retrievable via
/// [`crate::node::directory::NodeHandle::diagnostics`]. `BufferTooSmall` (a
/// fixed-size-C-buffer concern from the foreign-callable surface, §1
/// Non-goals: the C ABI shim is an external collaborator, not part of this
/// core) has no analogue here and isn't modelled.
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    NoDescription { owner: String },
    CustomProperty { owner: String, key: String },
    MissProperties { owner: String, keys: Vec<String> },
}

impl Warning {
    pub fn specifier(&self) -> &'static str {
        match self {
            Warning::NoDescription { .. } => "NoDescription",
            Warning::CustomProperty { .. } => "CustomProperty",
            Warning::MissProperties { .. } => "MissProperties",
        }
    }
}
