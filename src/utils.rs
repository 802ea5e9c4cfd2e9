// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Small stand-alone helpers shared by the node and client engines.

use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Result, anyhow};

/// Current wall time as fractional seconds since the Unix epoch, used
/// whenever a callback returns a NaN/infinite timestamp.
pub fn now_fractional_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Splits a SECoP qualified value reply of the shape
/// `[value,{"t":...,"e":...}]` into its three textual components
/// `(value, timestamp, sigma)`. Missing `t`/`e` keys yield empty strings for
/// the corresponding slot.
pub fn split_qualifier(raw: &str) -> Result<(String, String, String)> {
    let trimmed = raw.trim().trim_end_matches(['\n', '\r']);
    let parsed: serde_json::Value = serde_json::from_str(trimmed)
        .map_err(|e| anyhow!("split_qualifier: invalid JSON: {e}"))?;

    let arr = parsed
        .as_array()
        .ok_or_else(|| anyhow!("split_qualifier: expected a 2-element array"))?;

    let value = arr
        .first()
        .map(|v| serde_json::to_string(v).unwrap_or_default())
        .unwrap_or_default();

    let qualifier = arr.get(1).and_then(|v| v.as_object());
    let t = qualifier
        .and_then(|q| q.get("t"))
        .map(|v| match v {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or_default();
    let e = qualifier
        .and_then(|q| q.get("e"))
        .map(|v| match v {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or_default();

    Ok((value, t, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_qualifier_full() {
        let (v, t, e) =
            split_qualifier("[42,{\"t\":1533122805.354,\"e\":0.01}]\n").unwrap();
        assert_eq!(v, "42");
        assert_eq!(t, "1533122805.354");
        assert_eq!(e, "0.01");
    }

    #[test]
    fn split_qualifier_missing_sigma() {
        let (v, t, e) = split_qualifier("[1000.0,{\"t\":1533122806.0}]").unwrap();
        assert_eq!(v, "1000.0");
        assert_eq!(t, "1533122806.0");
        assert_eq!(e, "");
    }
}
