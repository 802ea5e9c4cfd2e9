// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Client-side error classes. Distinct from [`crate::node::protocol::ProtocolError`]
//! (the server's wire error classes) because a client additionally fails in
//! ways a server never does: dial failure, reconnect exhaustion, a blocking
//! read that outran its budget.

use thiserror::Error;

use crate::variant::VariantError;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ClientError {
    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("module not found: {0}")]
    ModuleNotFound(String),

    #[error("accessible not found: {0}")]
    AccessibleNotFound(String),

    #[error("property not found: {0}")]
    PropertyNotFound(String),

    #[error("parameter is not variable (constant, or neither readable nor writable): {0}")]
    NotVariable(String),

    #[error("no response within the requested budget")]
    Timeout,

    #[error("connection lost")]
    ConnectionLost,

    #[error("node did not answer after the reconnect back-off schedule was exhausted")]
    Rejected,

    #[error("server reported an error: {specifier}: {reason}")]
    ServerError { specifier: String, reason: String },

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("malformed descriptive JSON: {0}")]
    BadDescriptor(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<VariantError> for ClientError {
    fn from(e: VariantError) -> Self {
        match e {
            VariantError::InvalidType(msg) => ClientError::BadDescriptor(msg),
            VariantError::InvalidValue(msg) => ClientError::InvalidValue(msg),
            VariantError::OutOfBounds { value, min, max } => {
                ClientError::InvalidValue(format!("{value} out of bounds [{min}, {max}]"))
            },
            VariantError::BoundConflict(msg) => ClientError::InvalidValue(msg),
            VariantError::NoSuchPosition(pos) => {
                ClientError::Internal(format!("no such position {pos}"))
            },
            VariantError::KindMismatch(pos) => {
                ClientError::Internal(format!("kind mismatch at position {pos}"))
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
