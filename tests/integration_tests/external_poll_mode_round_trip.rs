// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! §4.4/§6: a module with no installed getter/setter/callback is finalised
//! into external-poll mode, and `read` blocks on an external driver pulling
//! the request via `get_stored_command` and resolving it with
//! `put_command_answer`.

use secop_rs::{
    node::directory::{
        add_module, add_property, add_readable_parameter, create_node, destroy_node, get_stored_command,
        node_complete, put_command_answer,
    },
    variant::Variant,
};
use serde_json::json;

use crate::integration_tests::common::{RawConn, ensure_library, next_node_id, next_port, settle};

#[tokio::test]
async fn external_poll_mode_round_trip() {
    ensure_library();
    let id = next_node_id("extpoll");
    let port = next_port();

    create_node(&id, "", port).await.unwrap();
    add_module(&id, "hpd").await.unwrap();
    add_readable_parameter(&id, "hpd", "value", None).await.unwrap();
    add_property(&format!("{id}:hpd:value"), "datainfo", json!({"type": "int"}))
        .await
        .unwrap();
    node_complete(&id).await.unwrap();
    settle().await;

    let mut conn = RawConn::connect(port).await.unwrap();
    conn.send("read hpd:value").await.unwrap();

    let stored = get_stored_command().await.expect("a read request was queued");
    assert_eq!(stored.node, id);
    assert_eq!(stored.module, "hpd");
    assert_eq!(stored.specifier, "value");
    put_command_answer(stored.id, Ok((Variant::int(7, i64::MIN, i64::MAX), None, 1_700_000_000.0)));

    let line = conn.recv_until("reply ").await.unwrap();
    assert_eq!(line, "reply hpd:value [7,{\"t\":1700000000.0}]");

    destroy_node(&id).await.unwrap();
}
