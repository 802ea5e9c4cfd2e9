// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::atomic::{AtomicU16, AtomicU64, Ordering};

use anyhow::{Context, Result};
use secop_rs::node::directory::init_library;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::TcpStream,
};

static NEXT_PORT: AtomicU16 = AtomicU16::new(30_500);
static NEXT_ID: AtomicU64 = AtomicU64::new(0);

/// A fresh loopback port for this process, so concurrently-running
/// integration tests never race to bind the same listener.
pub fn next_port() -> u16 {
    NEXT_PORT.fetch_add(1, Ordering::Relaxed)
}

/// A fresh node id for this process, distinct across concurrently-running
/// tests (the directory is a process-wide singleton, §4.5).
pub fn next_node_id(prefix: &str) -> String {
    format!("{prefix}-{}", NEXT_ID.fetch_add(1, Ordering::Relaxed))
}

/// Idempotent: every test may call this freely.
pub fn ensure_library() {
    init_library();
}

/// A raw line-oriented connection to a node's TCP listener, for tests that
/// want to drive the wire protocol directly (§4.6) rather than through the
/// client engine.
pub struct RawConn {
    write: tokio::net::tcp::OwnedWriteHalf,
    lines: tokio::io::Lines<BufReader<tokio::net::tcp::OwnedReadHalf>>,
}

impl RawConn {
    pub async fn connect(port: u16) -> Result<Self> {
        let stream = TcpStream::connect(("127.0.0.1", port))
            .await
            .context("connect to test node")?;
        let (read, write) = stream.into_split();
        Ok(Self { write, lines: BufReader::new(read).lines() })
    }

    pub async fn send(&mut self, line: &str) -> Result<()> {
        self.write.write_all(line.as_bytes()).await?;
        self.write.write_all(b"\n").await?;
        self.write.flush().await?;
        Ok(())
    }

    pub async fn recv_line(&mut self) -> Result<String> {
        self.lines
            .next_line()
            .await?
            .ok_or_else(|| anyhow::anyhow!("connection closed before a line arrived"))
    }

    /// Reads lines until one starts with `prefix`, returning it. Used to
    /// skip past snapshot `update` bursts when a test only cares about a
    /// later frame.
    pub async fn recv_until(&mut self, prefix: &str) -> Result<String> {
        loop {
            let line = self.recv_line().await?;
            if line.starts_with(prefix) {
                return Ok(line);
            }
        }
    }
}

/// Waits for a just-bound TCP listener to actually accept connections; a
/// `create_node` future returns once the listener is bound, but the spawned
/// accept loop needs a scheduler tick to start running.
pub async fn settle() {
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
}
