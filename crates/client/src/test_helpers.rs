// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for client tests.

#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use edbot_core::Envelope;
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

use crate::client::Client;
use crate::config::ClientConfig;
use crate::session::ConnectionState;
use crate::transport_tests::{MockListener, MockServer, MockTransport};

/// Handshake data: our device is `dev-1`; Ann is ours, Bob is someone
/// else's, Cal is free.
pub fn initial_state() -> Value {
    json!({
        "server": {"version": "5.1.0"},
        "session": {"device": {"id": "dev-1"}},
        "robots": {
            "Ann": {"name": "Ann", "model": {"type": "DREAM"}, "control": "dev-1"},
            "Bob": {"name": "Bob", "model": {"type": "ERGO"}, "control": "dev-2"},
            "Cal": {"name": "Cal", "model": {"type": "ERGO"}, "control": null},
        }
    })
}

pub fn test_config() -> ClientConfig {
    ClientConfig {
        name: Some("tests".to_string()),
        control_poll_interval_ms: 10,
        ..ClientConfig::default()
    }
}

/// Routes client logs to the test output. Filter with `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn mock_client(config: ClientConfig) -> (Client<MockTransport>, MockListener) {
    init_tracing();
    let (transport, listener) = MockTransport::new();
    (Client::with_transport(config, transport), listener)
}

/// Connects `client` through `listener`, answering INIT with `initial`.
pub async fn connect(
    client: &Client<MockTransport>,
    listener: &mut MockListener,
    initial: Value,
) -> MockServer {
    let (result, server) = tokio::join!(client.connect(), async {
        let mut server = listener.accept().await;
        server.handshake(initial).await;
        server
    });
    result.unwrap();
    assert_eq!(client.state(), ConnectionState::Synchronized);
    server
}

/// A synchronized client with [`initial_state`].
pub async fn connected_client() -> (Client<MockTransport>, MockListener, MockServer) {
    let (client, mut listener) = mock_client(test_config());
    let server = connect(&client, &mut listener, initial_state()).await;
    (client, listener, server)
}

/// A listener that records every envelope it sees.
pub fn recorder() -> (
    impl Fn(&Envelope) + Send + Sync + 'static,
    Arc<Mutex<Vec<Envelope>>>,
) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    (move |e: &Envelope| sink.lock().unwrap().push(e.clone()), seen)
}

/// Waits until `client` reaches `state`.
pub async fn wait_for_state<T: crate::transport::Transport>(
    client: &Client<T>,
    state: ConnectionState,
) {
    let mut changes = client.state_changes();
    tokio::time::timeout(Duration::from_secs(5), changes.wait_for(|s| *s == state))
        .await
        .unwrap()
        .unwrap();
}

/// Polls `check` until it holds.
pub async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..500 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(check(), "condition not met within 5s");
}
