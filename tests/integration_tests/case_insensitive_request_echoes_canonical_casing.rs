// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! spec.md:146 — names are matched case-insensitively, but every reply
//! echoes the declared (canonical) casing, regardless of how the request
//! specifier was cased.

use std::sync::Arc;

use secop_rs::{
    node::{
        accessible::{CommandCallback, Getter, Reading, Setter},
        directory::{
            add_command, add_module, add_property, add_writable_parameter, create_node, destroy_node,
            node_complete,
        },
    },
    variant::Variant,
};
use serde_json::json;

use crate::integration_tests::common::{RawConn, ensure_library, next_node_id, next_port, settle};

fn getter() -> Getter {
    Arc::new(|| Box::pin(async { Ok(Reading::now(Variant::double(0.0, f64::NAN, f64::NAN))) }))
}

fn setter() -> Setter {
    Arc::new(|requested: Variant| Box::pin(async move { Ok(Reading::now(requested)) }))
}

fn stop_callback() -> CommandCallback {
    Arc::new(|_arg| Box::pin(async { Ok(Reading::now(Variant::null())) }))
}

#[tokio::test]
async fn case_insensitive_request_echoes_canonical_casing() {
    ensure_library();
    let id = next_node_id("casing");
    let port = next_port();

    create_node(&id, "", port).await.unwrap();
    add_module(&id, "BigT").await.unwrap();
    add_writable_parameter(&id, "BigT", "Value", Some(getter()), Some(setter()))
        .await
        .unwrap();
    add_property(&format!("{id}:BigT:Value"), "datainfo", json!({"type": "double"}))
        .await
        .unwrap();
    add_command(&id, "BigT", "Stop", Some(stop_callback())).await.unwrap();
    node_complete(&id).await.unwrap();
    settle().await;

    let mut conn = RawConn::connect(port).await.unwrap();

    conn.send("read bigt:value").await.unwrap();
    let line = conn.recv_until("reply ").await.unwrap();
    assert!(line.starts_with("reply BigT:Value "), "unexpected line: {line}");

    conn.send("change BIGT:VALUE 12.5").await.unwrap();
    let line = conn.recv_until("changed ").await.unwrap();
    assert!(line.starts_with("changed BigT:Value "), "unexpected line: {line}");

    conn.send("do bigt:stop").await.unwrap();
    let line = conn.recv_until("done ").await.unwrap();
    assert!(line.starts_with("done BigT:Stop "), "unexpected line: {line}");

    destroy_node(&id).await.unwrap();
}
