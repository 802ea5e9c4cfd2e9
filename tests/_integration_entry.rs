// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

#![allow(clippy::all)]

mod integration_tests {
    pub mod common;

    pub mod blocking_test_read_after_activate;
    pub mod case_insensitive_request_echoes_canonical_casing;
    pub mod change_is_clamped_by_setter;
    pub mod command_with_null_argument_and_result;
    pub mod describe_reports_declared_datainfo;
    pub mod external_poll_mode_round_trip;
    pub mod read_returns_getter_reading;
    pub mod split_qualifier_helper;
    pub mod subscription_fanout;
}
