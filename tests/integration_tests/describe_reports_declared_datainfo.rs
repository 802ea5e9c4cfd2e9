// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! §8 scenario 1: a readable `double` parameter with a `unit` declared via
//! `datainfo` round-trips through `describe` unchanged.

use secop_rs::node::directory::{add_module, add_property, add_readable_parameter, create_node, destroy_node, node_complete};
use serde_json::json;

use crate::integration_tests::common::{RawConn, ensure_library, next_node_id, next_port, settle};

#[tokio::test]
async fn describe_reports_declared_datainfo() {
    ensure_library();
    let id = next_node_id("describe");
    let port = next_port();

    create_node(&id, "", port).await.unwrap();
    add_module(&id, "hpd").await.unwrap();
    add_readable_parameter(&id, "hpd", "value", None).await.unwrap();
    add_property(&format!("{id}:hpd:value"), "datainfo", json!({"type": "double", "unit": "K"}))
        .await
        .unwrap();
    node_complete(&id).await.unwrap();
    settle().await;

    let mut conn = RawConn::connect(port).await.unwrap();
    conn.send("describe").await.unwrap();
    let line = conn.recv_line().await.unwrap();
    let prefix = "describing . ";
    assert!(line.starts_with(prefix), "unexpected line: {line}");

    let parsed: serde_json::Value = serde_json::from_str(&line[prefix.len()..]).unwrap();
    assert_eq!(
        parsed["modules"]["hpd"]["accessibles"]["value"]["datainfo"],
        json!({"type": "double", "unit": "K"})
    );

    destroy_node(&id).await.unwrap();
}
