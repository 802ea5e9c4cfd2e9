// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Process-level configuration (§6 "environment and persistence"): knobs
//! that sit outside the wire protocol entirely — listen bind address,
//! the module-scheduler poll-interval clamps (§4.4), client connect
//! timeouts, and the client reconnect back-off table (§4.7). None of this
//! is transported; it configures the process hosting nodes and/or client
//! sessions, loaded from a single YAML file.

use std::{fs, net::IpAddr, path::Path, time::Duration};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::{client::DEFAULT_IO_TIMEOUT, node::module::{MAX_POLL_MS, MIN_POLL_MS}};

/// Top-level process configuration, loaded from YAML.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SecopConfig {
    /// Server-side knobs; absent (all-default) for a client-only process.
    #[serde(default)]
    pub server: ServerConfig,
    /// Client-side knobs; absent (all-default) for a server-only process.
    #[serde(default)]
    pub client: ClientConfig,
}

/// Knobs for a process hosting [`crate::node::directory`] nodes.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ServerConfig {
    /// Interface the TCP listener binds to for every `create_node` (§4.5).
    /// An empty string means "any" (`0.0.0.0`).
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Lower clamp applied to every module's `actualPollMs` (§4.4). Must
    /// not be set below the protocol floor of 10ms.
    #[serde(default = "default_poll_floor_ms")]
    pub poll_interval_floor_ms: u64,

    /// Upper clamp applied to every module's `actualPollMs` (§4.4). Must
    /// not exceed the protocol ceiling of one hour.
    #[serde(default = "default_poll_ceiling_ms")]
    pub poll_interval_ceiling_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            poll_interval_floor_ms: default_poll_floor_ms(),
            poll_interval_ceiling_ms: default_poll_ceiling_ms(),
        }
    }
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_poll_floor_ms() -> u64 {
    MIN_POLL_MS
}

fn default_poll_ceiling_ms() -> u64 {
    MAX_POLL_MS
}

/// Knobs for a process driving [`crate::client`] sessions.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ClientConfig {
    /// Budget for a single dial / `describe` / `activate` round trip (§4.7:
    /// "optionally waits up to 2 s for the socket").
    #[serde(default = "default_io_timeout_secs", rename = "io_timeout_secs", with = "serde_secs_f64")]
    pub io_timeout: Duration,

    /// Geometric reconnect back-off schedule in seconds (§4.7, §8). The
    /// last entry repeats for any attempt beyond the table's length.
    #[serde(default = "default_backoff_secs")]
    pub reconnect_backoff_secs: Vec<f64>,

    /// Reconnect attempt cap before a session becomes `Rejected` (§4.7).
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            io_timeout: default_io_timeout_secs(),
            reconnect_backoff_secs: default_backoff_secs(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
        }
    }
}

fn default_io_timeout_secs() -> Duration {
    DEFAULT_IO_TIMEOUT
}

fn default_backoff_secs() -> Vec<f64> {
    vec![0.5, 1.0, 5.0, 10.0, 20.0, 30.0]
}

fn default_max_reconnect_attempts() -> u32 {
    100
}

impl SecopConfig {
    /// Loads the configuration from YAML, validates it, and returns the
    /// ready-to-use value.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        let mut cfg: SecopConfig =
            serde_yaml::from_str(&s).context("failed to parse config YAML")?;
        cfg.validate_and_normalize()?;
        Ok(cfg)
    }

    /// Validates invariants the wire protocol itself also enforces, so a
    /// bad config is rejected at load time instead of silently clamped
    /// later by the scheduler.
    pub fn validate_and_normalize(&mut self) -> Result<()> {
        if !self.server.bind_address.is_empty() {
            ensure!(
                self.server.bind_address.parse::<IpAddr>().is_ok(),
                "server.bind_address {:?} is not a valid IP address",
                self.server.bind_address
            );
        }
        ensure!(
            self.server.poll_interval_floor_ms >= MIN_POLL_MS,
            "server.poll_interval_floor_ms must be >= {MIN_POLL_MS}"
        );
        ensure!(
            self.server.poll_interval_ceiling_ms <= MAX_POLL_MS,
            "server.poll_interval_ceiling_ms must be <= {MAX_POLL_MS}"
        );
        ensure!(
            self.server.poll_interval_floor_ms <= self.server.poll_interval_ceiling_ms,
            "server.poll_interval_floor_ms must be <= poll_interval_ceiling_ms"
        );

        ensure!(!self.client.io_timeout.is_zero(), "client.io_timeout_secs must be > 0");
        ensure!(
            !self.client.reconnect_backoff_secs.is_empty(),
            "client.reconnect_backoff_secs must not be empty"
        );
        ensure!(
            self.client.reconnect_backoff_secs.iter().all(|s| *s > 0.0),
            "client.reconnect_backoff_secs entries must be > 0"
        );
        ensure!(
            self.client.max_reconnect_attempts >= 1,
            "client.max_reconnect_attempts must be >= 1"
        );

        Ok(())
    }
}

/// Serde helper for representing a `Duration` as a fractional number of
/// seconds — the client's timeout knobs are sub-second.
mod serde_secs_f64 {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Ok(Duration::from_secs_f64(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let mut cfg = SecopConfig { server: ServerConfig::default(), client: ClientConfig::default() };
        cfg.validate_and_normalize().unwrap();
    }

    #[test]
    fn empty_backoff_table_rejected() {
        let mut cfg = SecopConfig {
            server: ServerConfig::default(),
            client: ClientConfig { reconnect_backoff_secs: vec![], ..ClientConfig::default() },
        };
        assert!(cfg.validate_and_normalize().is_err());
    }

    #[test]
    fn floor_above_ceiling_rejected() {
        let mut cfg = SecopConfig {
            server: ServerConfig {
                poll_interval_floor_ms: 5000,
                poll_interval_ceiling_ms: 1000,
                ..ServerConfig::default()
            },
            client: ClientConfig::default(),
        };
        assert!(cfg.validate_and_normalize().is_err());
    }

    #[test]
    fn parses_minimal_yaml() {
        let yaml = "server:\n  bind_address: \"127.0.0.1\"\nclient:\n  io_timeout_secs: 1.5\n";
        let mut cfg: SecopConfig = serde_yaml::from_str(yaml).unwrap();
        cfg.validate_and_normalize().unwrap();
        assert_eq!(cfg.server.bind_address, "127.0.0.1");
        assert_eq!(cfg.client.io_timeout, Duration::from_secs_f64(1.5));
        assert_eq!(cfg.client.reconnect_backoff_secs, default_backoff_secs());
    }
}
