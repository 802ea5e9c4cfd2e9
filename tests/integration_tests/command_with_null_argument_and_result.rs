// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! §8 scenario 4: a command declared without a `datainfo` property defaults
//! to `null` argument and result types, so `do` with no argument text
//! succeeds and echoes a `null` result.

use std::sync::Arc;

use secop_rs::node::{
    accessible::{CommandCallback, Reading},
    directory::{add_command, add_module, create_node, destroy_node, node_complete},
};

use crate::integration_tests::common::{RawConn, ensure_library, next_node_id, next_port, settle};

fn stop_callback() -> CommandCallback {
    Arc::new(|_arg| Box::pin(async { Ok(Reading::now(secop_rs::variant::Variant::null())) }))
}

#[tokio::test]
async fn command_with_null_argument_and_result() {
    ensure_library();
    let id = next_node_id("cmd");
    let port = next_port();

    create_node(&id, "", port).await.unwrap();
    add_module(&id, "hpd").await.unwrap();
    add_command(&id, "hpd", "stop", Some(stop_callback())).await.unwrap();
    node_complete(&id).await.unwrap();
    settle().await;

    let mut conn = RawConn::connect(port).await.unwrap();
    conn.send("do hpd:stop").await.unwrap();
    let line = conn.recv_until("done ").await.unwrap();
    assert!(line.starts_with("done hpd:stop [null,{\"t\":"), "unexpected line: {line}");

    destroy_node(&id).await.unwrap();
}
