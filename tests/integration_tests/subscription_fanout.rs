// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! §4.6 subscription semantics: a `change` on session A yields exactly one
//! `changed` on A and one `update` on the other active session B, carrying
//! the setter's (possibly clamped) value — never the raw request.

use std::sync::Arc;

use secop_rs::node::{
    accessible::{Getter, Reading, Setter},
    directory::{add_module, add_property, add_writable_parameter, create_node, destroy_node, node_complete},
};
use secop_rs::variant::Variant;
use serde_json::json;

use crate::integration_tests::common::{RawConn, ensure_library, next_node_id, next_port, settle};

fn getter() -> Getter {
    Arc::new(|| Box::pin(async { Ok(Reading::now(Variant::double(0.0, -273.15, 1000.0))) }))
}

fn setter() -> Setter {
    Arc::new(|_requested: Variant| {
        Box::pin(async { Ok(Reading::now(Variant::double(12.5, -273.15, 1000.0))) })
    })
}

#[tokio::test]
async fn subscription_fanout() {
    ensure_library();
    let id = next_node_id("fanout");
    let port = next_port();

    create_node(&id, "", port).await.unwrap();
    add_module(&id, "hpd").await.unwrap();
    add_writable_parameter(&id, "hpd", "target", Some(getter()), Some(setter()))
        .await
        .unwrap();
    add_property(&format!("{id}:hpd:target"), "datainfo", json!({"type": "double"}))
        .await
        .unwrap();
    node_complete(&id).await.unwrap();
    settle().await;

    let mut a = RawConn::connect(port).await.unwrap();
    a.send("activate").await.unwrap();
    a.recv_until("active").await.unwrap();

    let mut b = RawConn::connect(port).await.unwrap();
    b.send("activate").await.unwrap();
    b.recv_until("active").await.unwrap();

    a.send("change hpd:target 999").await.unwrap();
    let changed = a.recv_until("changed ").await.unwrap();
    assert!(changed.starts_with("changed hpd:target [12.5,"), "unexpected line: {changed}");

    let update = b.recv_until("update hpd:target").await.unwrap();
    assert!(update.starts_with("update hpd:target [12.5,"), "unexpected line: {update}");

    destroy_node(&id).await.unwrap();
}
