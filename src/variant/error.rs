// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use thiserror::Error;

/// Failure modes of the variant type system (§7 `InvalidType` / `InvalidValue`).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum VariantError {
    #[error("invalid type descriptor: {0}")]
    InvalidType(String),

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("value {value} out of bounds [{min}, {max}]")]
    OutOfBounds {
        value: String,
        min: String,
        max: String,
    },

    #[error("bound conflicts with current value: {0}")]
    BoundConflict(String),

    #[error("position {0} addresses no node")]
    NoSuchPosition(usize),

    #[error("node at position {0} is not of the expected kind")]
    KindMismatch(usize),
}

pub type Result<T> = std::result::Result<T, VariantError>;
