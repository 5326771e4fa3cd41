// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Client configuration.
//!
//! Every field has a default, so an empty TOML fragment is a valid config:
//!
//! ```toml
//! server = "edbot.local"
//! name = "Classroom laptop"
//! request_timeout_ms = 5000
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Connection settings for an Edbot Studio server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Host running Edbot Studio (default: "localhost").
    #[serde(default = "default_server")]
    pub server: String,
    /// Port of the WebSocket API (default: 54255).
    #[serde(default = "default_port")]
    pub port: u16,
    /// Client name shown in Edbot Studio.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Ask the server to stream sensor reports (default: true).
    #[serde(default = "default_reporters")]
    pub reporters: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_alias: Option<String>,
    /// Per-request timeout in milliseconds. Unset waits forever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_ms: Option<u64>,
    /// Overall limit for `await_control` in milliseconds. Unset waits forever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_timeout_ms: Option<u64>,
    /// How often `await_control` re-reads the mirror (default: 100).
    #[serde(default = "default_control_poll_interval_ms")]
    pub control_poll_interval_ms: u64,
    /// How long a requested close waits for the server's close frame before
    /// the socket is dropped (default: 2000).
    #[serde(default = "default_close_timeout_ms")]
    pub close_timeout_ms: u64,
}

fn default_server() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    54255
}

fn default_reporters() -> bool {
    true
}

fn default_control_poll_interval_ms() -> u64 {
    100
}

fn default_close_timeout_ms() -> u64 {
    2000
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            server: default_server(),
            port: default_port(),
            name: None,
            reporters: default_reporters(),
            device_alias: None,
            request_timeout_ms: None,
            control_timeout_ms: None,
            control_poll_interval_ms: default_control_poll_interval_ms(),
            close_timeout_ms: default_close_timeout_ms(),
        }
    }
}

impl ClientConfig {
    /// Creates a config for the given server and port, defaults elsewhere.
    pub fn new(server: impl Into<String>, port: u16) -> Self {
        ClientConfig {
            server: server.into(),
            port,
            ..Self::default()
        }
    }

    /// Parses a config from a TOML fragment.
    pub fn from_toml(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// The WebSocket endpoint.
    pub fn url(&self) -> String {
        format!("ws://{}:{}/api", self.server, self.port)
    }

    /// Parameters sent with the handshake request.
    pub fn init_params(&self) -> Value {
        edbot_core::init_params(
            self.name.as_deref(),
            self.reporters,
            self.device_alias.as_deref(),
        )
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    pub fn control_timeout(&self) -> Option<Duration> {
        self.control_timeout_ms.map(Duration::from_millis)
    }

    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }

    /// Poll period for `await_control`, never zero.
    pub fn control_poll_interval(&self) -> Duration {
        Duration::from_millis(self.control_poll_interval_ms.max(1))
    }
}
