// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! A pure-Rust implementation of the core of the Sample Environment
//! Communication Protocol (SECoP): the self-describing [`variant`] value
//! tree, the server-side [`node`] engine (directory, module scheduler,
//! session worker), and the [`client`] engine (session, cache, reconnect).

pub mod cfg;
pub mod client;
pub mod node;
pub mod property;
pub mod utils;
pub mod variant;
