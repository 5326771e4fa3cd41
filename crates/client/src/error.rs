// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use thiserror::Error;

use crate::transport::TransportError;

/// Errors returned by client operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The session is not synchronized with the server.
    #[error("not connected")]
    NotConnected,

    /// The named robot is not in the server's registry.
    #[error("robot {0} is not configured")]
    NotConfigured(String),

    /// The server answered with `success = false`.
    #[error("request failed: {0}")]
    Remote(String),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The connection went away before the call settled.
    #[error("connection closed ({code}): {reason}")]
    ConnectionClosed { code: u16, reason: String },

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("connect already in progress")]
    ConnectInProgress,

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] edbot_core::Error),

    #[error("invalid config: {0}")]
    Config(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
