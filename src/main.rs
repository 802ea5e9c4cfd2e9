// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::{
    Arc,
    atomic::{AtomicI64, Ordering},
};

use anyhow::{Context, Result};
use secop_rs::{
    cfg::{cli::resolve_config_path, config::SecopConfig, logger::init_logger},
    node::{
        accessible::{Getter, Reading},
        directory::{add_module, add_property, add_readable_parameter, create_node, init_library, node_complete},
    },
    variant::Variant,
};
use serde_json::json;
use tokio::signal;
use tracing::info;

/// A minimal stand-in for the hotplate simulator this library's demo GUI
/// normally drives: one module, `hpd`, exposing a `value` parameter whose
/// getter reports a slowly drifting temperature in millikelvin steps.
fn value_getter() -> Getter {
    let reading = Arc::new(AtomicI64::new(293_150));
    Arc::new(move || {
        let reading = reading.clone();
        Box::pin(async move {
            let milli_kelvin = reading.fetch_add(5, Ordering::Relaxed) + 5;
            Ok(Reading::now(Variant::double(milli_kelvin as f64 / 1000.0, f64::NAN, f64::NAN)))
        })
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let _logger_guard = init_logger("tests/config_logger.yaml").ok();

    let cfg = resolve_config_path("tests/config.yaml")
        .and_then(SecopConfig::load_from_file)
        .context("failed to resolve or load config")?;
    info!(bind = %cfg.server.bind_address, "loaded configuration");

    init_library();
    create_node("HZB", "demo sample environment node", 2055)
        .await
        .context("create_node failed")?;
    add_module("HZB", "hpd").await.context("add_module failed")?;
    add_property("HZB:hpd", "description", json!("simulated hotplate"))
        .await
        .context("add_property(module description) failed")?;

    add_readable_parameter("HZB", "hpd", "value", Some(value_getter()))
        .await
        .context("add_readable_parameter failed")?;
    add_property("HZB:hpd:value", "datainfo", json!({"type": "double", "unit": "K"}))
        .await
        .context("add_property(datainfo) failed")?;
    add_property("HZB:hpd:value", "description", json!("measured temperature"))
        .await
        .context("add_property(description) failed")?;

    node_complete("HZB").await.context("node_complete failed")?;
    info!("node HZB listening on port 2055");

    signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
    secop_rs::node::directory::done_library().await;
    Ok(())
}
