// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! §8 scenario 2: `read` invokes the getter and emits its reading verbatim,
//! qualifier and all.

use std::sync::Arc;

use secop_rs::{
    node::{
        accessible::{Getter, Reading},
        directory::{add_module, add_property, add_readable_parameter, create_node, destroy_node, node_complete},
    },
    variant::Variant,
};
use serde_json::json;

use crate::integration_tests::common::{RawConn, ensure_library, next_node_id, next_port, settle};

fn fixed_reading_getter() -> Getter {
    Arc::new(|| {
        Box::pin(async {
            Ok(Reading {
                value: Variant::double(42.5, f64::NAN, f64::NAN),
                sigma: Some(0.01),
                timestamp: 1_533_122_805.354,
            })
        })
    })
}

#[tokio::test]
async fn read_returns_getter_reading() {
    ensure_library();
    let id = next_node_id("read");
    let port = next_port();

    create_node(&id, "", port).await.unwrap();
    add_module(&id, "hpd").await.unwrap();
    add_readable_parameter(&id, "hpd", "value", Some(fixed_reading_getter())).await.unwrap();
    add_property(&format!("{id}:hpd:value"), "datainfo", json!({"type": "double"}))
        .await
        .unwrap();
    node_complete(&id).await.unwrap();
    settle().await;

    let mut conn = RawConn::connect(port).await.unwrap();
    conn.send("read hpd:value").await.unwrap();
    let line = conn.recv_until("reply ").await.unwrap();
    assert_eq!(line, "reply hpd:value [42.5,{\"t\":1533122805.354,\"e\":0.01}]");

    destroy_node(&id).await.unwrap();
}
