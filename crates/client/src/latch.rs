// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Waiting for control of a robot.
//!
//! Only one device controls a robot at a time. Control changes arrive as
//! UPDATE patches to `robots.<name>.control`, so waiting is a matter of
//! re-reading the mirror until it names this device.

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::client::Client;
use crate::error::{Error, Result};
use crate::transport::Transport;

impl<T: Transport> Client<T> {
    /// Resolves once this client controls the named robot.
    ///
    /// Fails at once if not connected or the robot is unknown, and with
    /// [`Error::NotConnected`] if the connection drops while waiting.
    /// `control_timeout_ms` bounds the wait.
    pub async fn await_control(&self, name: &str) -> Result<()> {
        if self.have_control(name)? {
            return Ok(());
        }

        let period = self.config().control_poll_interval();
        debug!(robot = name, ?period, "Waiting for control");
        match self.config().control_timeout() {
            None => self.poll_control(name, period).await,
            Some(limit) => tokio::time::timeout(limit, self.poll_control(name, period))
                .await
                .map_err(|_| Error::Timeout(limit))?,
        }
    }

    async fn poll_control(&self, name: &str, period: Duration) -> Result<()> {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if self.have_control(name)? {
                debug!(robot = name, "Control acquired");
                return Ok(());
            }
        }
    }
}
