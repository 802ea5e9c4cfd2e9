// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use anyhow::{Result, anyhow};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

pub(super) async fn io_with_timeout<F, T>(
    label: &'static str,
    fut: F,
    io_timeout: Duration,
    cancel: &CancellationToken,
) -> Result<T>
where F: Future<Output = std::io::Result<T>> {
    tokio::select! {
        _ = cancel.cancelled() => Err(anyhow!("{label} cancelled")),
        res = timeout(io_timeout, fut) => {
            match res {
                Ok(Ok(v)) => Ok(v),
                Ok(Err(e)) => Err(e.into()),
                Err(_) => Err(anyhow!("{label} timeout")),
            }
        }
    }
}

/// The three-element SECoP value/qualifier frame shape shared by
/// `reply`/`changed`/`done`/`update`: `[value, {"t":..., "e":...}]`.
/// Parses the qualifier half the same way the server emitter writes it
/// (§4.7).
pub(super) fn parse_qualifier(json: &serde_json::Value) -> (Option<f64>, Option<f64>) {
    let obj = json.as_object();
    let t = obj.and_then(|o| o.get("t")).and_then(|v| v.as_f64());
    let e = obj.and_then(|o| o.get("e")).and_then(|v| v.as_f64());
    (t, e)
}
