// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The client node engine (§4.7): a TCP session manager that issues
//! `describe`/`activate` on connect, parses descriptive JSON into the same
//! Variant tree the server uses, tracks outstanding requests per session,
//! matches incoming frames to pending requests or to the cache, and
//! supports blocking read-with-timeout on top of the asynchronous stream.

#![allow(clippy::module_inception)]
pub mod api;
pub mod cache;
pub mod common;
pub mod connection;
pub mod error;
pub mod registry;
pub mod session;

pub use api::*;
pub use error::ClientError;
