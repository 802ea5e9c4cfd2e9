// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! §8 scenario 5: `split_qualifier` applied to an actual wire line captured
//! from a live node, not just a hand-built JSON literal.

use secop_rs::{
    node::directory::{add_module, add_property, add_readable_parameter, create_node, destroy_node, node_complete},
    utils::split_qualifier,
};
use serde_json::json;
use std::sync::Arc;

use crate::integration_tests::common::{RawConn, ensure_library, next_node_id, next_port, settle};

#[tokio::test]
async fn split_qualifier_helper() {
    ensure_library();
    let id = next_node_id("splitq");
    let port = next_port();

    let getter: secop_rs::node::accessible::Getter = Arc::new(|| {
        Box::pin(async {
            Ok(secop_rs::node::accessible::Reading {
                value: secop_rs::variant::Variant::double(1000.0, f64::NAN, f64::NAN),
                sigma: None,
                timestamp: 1_533_122_806.0,
            })
        })
    });

    create_node(&id, "", port).await.unwrap();
    add_module(&id, "hpd").await.unwrap();
    add_readable_parameter(&id, "hpd", "value", Some(getter)).await.unwrap();
    add_property(&format!("{id}:hpd:value"), "datainfo", json!({"type": "double"}))
        .await
        .unwrap();
    node_complete(&id).await.unwrap();
    settle().await;

    let mut conn = RawConn::connect(port).await.unwrap();
    conn.send("read hpd:value").await.unwrap();
    let line = conn.recv_until("reply ").await.unwrap();
    let payload = line.strip_prefix("reply hpd:value ").expect("reply prefix");

    let (value, t, e) = split_qualifier(payload).unwrap();
    assert_eq!(value, "1000.0");
    assert_eq!(t, "1533122806.0");
    assert_eq!(e, "");

    destroy_node(&id).await.unwrap();
}
