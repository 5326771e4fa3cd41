// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! edbot-client: Async client for the Edbot Studio WebSocket API.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Client    │────►│  Transport  │────►│   Edbot     │
//! │  (Session)  │◄────│   (trait)   │◄────│   Studio    │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!        │
//!        ▼
//! ┌─────────────┐
//! │ StateMirror │  (server state, patched live)
//! └─────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use edbot_client::{Client, ClientConfig};
//! use serde_json::json;
//!
//! # async fn run() -> edbot_client::Result<()> {
//! let client = Client::new(ClientConfig::default());
//! client.connect().await?;
//! client.await_control("Bob").await?;
//! client.say(json!({"name": "Bob", "text": "Hello"}))?.await?;
//! client.disconnect().await
//! # }
//! ```

mod client;
mod config;
mod error;
mod latch;
mod pending;
mod session;
mod transport;

pub use client::{Client, Listener, Reply};
pub use config::ClientConfig;
pub use edbot_core::{sensor, Category, Envelope, RequestType, Status};
pub use error::{Error, Result};
pub use session::ConnectionState;
pub use transport::{
    Channel, ChannelEnd, ChannelEvent, Outbound, Transport, TransportError, TransportResult,
    WebSocketTransport, CLOSE_ABNORMAL, CLOSE_NORMAL, CLOSE_NO_STATUS, DEFAULT_CLOSE_TIMEOUT,
};

#[cfg(test)]
mod test_helpers;


#[cfg(test)]
mod config_tests;
