// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use serde_json::json;
use yare::parameterized;

use crate::config::ClientConfig;
use crate::error::Error;

#[test]
fn defaults() {
    let config = ClientConfig::default();
    assert_eq!(config.server, "localhost");
    assert_eq!(config.port, 54255);
    assert!(config.reporters);
    assert_eq!(config.name, None);
    assert_eq!(config.request_timeout(), None);
    assert_eq!(config.control_timeout(), None);
    assert_eq!(config.control_poll_interval(), Duration::from_millis(100));
    assert_eq!(config.close_timeout(), Duration::from_secs(2));
    assert_eq!(config.url(), "ws://localhost:54255/api");
}

#[test]
fn empty_toml_is_default() {
    assert_eq!(ClientConfig::from_toml("").unwrap(), ClientConfig::default());
}

#[test]
fn toml_overrides() {
    let config = ClientConfig::from_toml(
        r#"
        server = "edbot.local"
        port = 8080
        name = "Lab PC"
        reporters = false
        device_alias = "lab-1"
        request_timeout_ms = 2500
        control_timeout_ms = 10000
        control_poll_interval_ms = 50
        close_timeout_ms = 250
        "#,
    )
    .unwrap();

    assert_eq!(config.url(), "ws://edbot.local:8080/api");
    assert_eq!(config.name.as_deref(), Some("Lab PC"));
    assert!(!config.reporters);
    assert_eq!(config.device_alias.as_deref(), Some("lab-1"));
    assert_eq!(config.request_timeout(), Some(Duration::from_millis(2500)));
    assert_eq!(config.control_timeout(), Some(Duration::from_secs(10)));
    assert_eq!(config.control_poll_interval(), Duration::from_millis(50));
    assert_eq!(config.close_timeout(), Duration::from_millis(250));
}

#[parameterized(
    port_as_string = { r#"port = "abc""# },
    port_overflow = { "port = 70000" },
    not_toml = { "server = " },
)]
fn invalid_toml(input: &str) {
    assert!(matches!(ClientConfig::from_toml(input), Err(Error::Config(_))));
}

#[test]
fn zero_poll_interval_is_clamped() {
    let config = ClientConfig {
        control_poll_interval_ms: 0,
        ..ClientConfig::default()
    };
    assert_eq!(config.control_poll_interval(), Duration::from_millis(1));
}

#[test]
fn init_params_shape() {
    let mut config = ClientConfig::new("host", 1);
    assert_eq!(
        config.init_params(),
        json!({"name": null, "reporters": true, "deviceAlias": null})
    );

    config.name = Some("Ann".into());
    config.device_alias = Some("tablet".into());
    assert_eq!(
        config.init_params(),
        json!({"name": "Ann", "reporters": true, "deviceAlias": "tablet"})
    );
}
