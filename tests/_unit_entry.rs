// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

#![allow(clippy::all)]

mod unit_tests {
    pub mod enum_import;
    pub mod scheduler_cadence;
    pub mod variant_roundtrip;
}
