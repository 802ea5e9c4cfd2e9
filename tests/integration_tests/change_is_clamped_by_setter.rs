// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! §8 scenario 3: a setter may clamp the requested value; the cached and
//! emitted value is whatever the setter reports, not the raw request.

use std::sync::Arc;

use secop_rs::{
    node::{
        accessible::{Getter, Reading, Setter},
        directory::{add_module, add_property, add_writable_parameter, create_node, destroy_node, node_complete},
    },
    variant::Variant,
};
use serde_json::json;

use crate::integration_tests::common::{RawConn, ensure_library, next_node_id, next_port, settle};

fn clamping_setter() -> Setter {
    Arc::new(|requested: Variant| {
        Box::pin(async move {
            let requested = match &requested.kind {
                secop_rs::variant::VariantKind::Double { value, .. } => *value,
                _ => 0.0,
            };
            let clamped = requested.clamp(-273.15, 1000.0);
            Ok(Reading::now(Variant::double(clamped, -273.15, 1000.0)))
        })
    })
}

fn passthrough_getter() -> Getter {
    Arc::new(|| Box::pin(async { Ok(Reading::now(Variant::double(0.0, -273.15, 1000.0))) }))
}

#[tokio::test]
async fn change_is_clamped_by_setter() {
    ensure_library();
    let id = next_node_id("change");
    let port = next_port();

    create_node(&id, "", port).await.unwrap();
    add_module(&id, "hpd").await.unwrap();
    add_writable_parameter(&id, "hpd", "target", Some(passthrough_getter()), Some(clamping_setter()))
        .await
        .unwrap();
    // Declare the wire type without its own bounds (§3: bounds live on the
    // cached Variant the setter's own clamping is layered on top of,
    // matching the source's "setter may mutate the value" contract).
    add_property(&format!("{id}:hpd:target"), "datainfo", json!({"type": "double"}))
        .await
        .unwrap();
    node_complete(&id).await.unwrap();
    settle().await;

    let mut conn = RawConn::connect(port).await.unwrap();
    conn.send("change hpd:target 1e6").await.unwrap();
    let line = conn.recv_until("changed ").await.unwrap();
    assert!(line.starts_with("changed hpd:target [1000.0,"), "unexpected line: {line}");

    // The strict import against the declared `datainfo` type (no bounds)
    // must itself accept 1e6 — clamping is entirely the setter's job.
    let mut v = Variant::double(0.0, f64::NAN, f64::NAN);
    import_value(&mut v, &json!(1e6), true).unwrap();

    destroy_node(&id).await.unwrap();
}
