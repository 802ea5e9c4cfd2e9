// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! §4.7 scenario 6: the snapshot burst `activate` produces is drained into
//! the cache before `add_node` returns, so a cache-only read right after
//! connecting already sees the server's last cached value — no further
//! wire round trip required.

use std::sync::Arc;

use secop_rs::{
    client::{add_node, read_parameter, remove_node},
    node::{
        accessible::{Getter, Reading},
        directory::{add_module, add_property, add_readable_parameter, create_node, destroy_node, dispatch_read, node_complete},
    },
    variant::Variant,
};
use serde_json::json;

use crate::integration_tests::common::{ensure_library, next_node_id, next_port, settle};

fn fixed_getter() -> Getter {
    Arc::new(|| Box::pin(async { Ok(Reading::now(Variant::double(37.0, f64::NAN, f64::NAN))) }))
}

#[tokio::test]
async fn blocking_test_read_after_activate() {
    ensure_library();
    let id = next_node_id("snapshot");
    let port = next_port();

    create_node(&id, "", port).await.unwrap();
    add_module(&id, "hpd").await.unwrap();
    add_readable_parameter(&id, "hpd", "value", Some(fixed_getter())).await.unwrap();
    add_property(&format!("{id}:hpd:value"), "datainfo", json!({"type": "double"}))
        .await
        .unwrap();
    node_complete(&id).await.unwrap();
    settle().await;

    // Populate the cache before any client connects, so `activate`'s
    // snapshot burst has something to report.
    dispatch_read(&id, "hpd", "value").await.unwrap();

    let client_id = add_node("127.0.0.1", port, true).await.unwrap();

    let (value, _t, _e) = read_parameter(&client_id, "hpd", "value").await.unwrap();
    assert_eq!(value, json!(37.0));

    remove_node("127.0.0.1", port).unwrap();
    destroy_node(&id).await.unwrap();
}
