// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Connection state machine.
//!
//! ```text
//!                connect()               INIT success
//! Disconnected ───────────► Connecting ───────────────► Synchronized
//!      ▲                        │                            │
//!      └────────────────────────┴────────────────────────────┘
//!     INIT failure, channel error, open failure, close or close request
//! ```
//!
//! A close request leaves the connected states at once. The channel's final
//! close event then rejects whatever calls are still pending.
//!
//! `Session` does no I/O. The client feeds it channel events and forwards
//! whatever it hands back (listener notifications, settled calls) after
//! releasing its lock. Every connection attempt gets a new generation so
//! late events from an older channel are ignored.

use std::fmt;

use edbot_core::{Category, Envelope, Patch, Request, RequestType, StateMirror};
use serde_json::{Map, Value};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::pending::{PendingCalls, Responder};
use crate::transport::{Outbound, TransportError, CLOSE_NORMAL};

/// Where the client is in its connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    /// Channel opening or handshake in flight.
    Connecting,
    /// Handshake done and the mirror is live.
    Synchronized,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Synchronized => "synchronized",
        };
        f.write_str(name)
    }
}

/// Receives the outcome of a call.
pub(crate) type Settlement = oneshot::Receiver<Result<Value>>;

/// What the client must do after dispatching an envelope.
#[derive(Debug)]
pub(crate) struct Dispatched {
    /// Envelope to hand to the listener.
    pub envelope: Envelope,
    /// Sequence and outcome to settle after the listener ran.
    pub settle: Option<(u64, Result<Value>)>,
}

#[derive(Debug)]
pub(crate) struct Session {
    state: ConnectionState,
    generation: u64,
    mirror: StateMirror,
    pending: PendingCalls,
    outbound: Option<mpsc::UnboundedSender<Outbound>>,
    init_sequence: Option<u64>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Session {
            state: ConnectionState::Disconnected,
            generation: 0,
            mirror: StateMirror::new(),
            pending: PendingCalls::new(),
            outbound: None,
            init_sequence: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[cfg(test)]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Starts a connection attempt.
    ///
    /// Returns the new generation, or `None` when already synchronized.
    pub fn begin_connect(&mut self) -> Result<Option<u64>> {
        match self.state {
            ConnectionState::Synchronized => Ok(None),
            ConnectionState::Connecting => Err(Error::ConnectInProgress),
            ConnectionState::Disconnected => {
                // Calls left by a channel that is still closing.
                for (sequence, responder) in self.pending.drain_abandoned() {
                    debug!(sequence, "Rejecting call from previous connection");
                    let _ = responder.send(Err(Error::ConnectionClosed {
                        code: CLOSE_NORMAL,
                        reason: "connection replaced".to_string(),
                    }));
                }
                self.generation += 1;
                self.state = ConnectionState::Connecting;
                self.mirror.reset();
                self.pending = PendingCalls::new();
                self.outbound = None;
                self.init_sequence = None;
                Ok(Some(self.generation))
            }
        }
    }

    /// Attaches the opened channel and sends INIT.
    ///
    /// If the attempt was cancelled or superseded while the channel opened,
    /// the channel is closed and the attempt fails.
    pub fn handshake(
        &mut self,
        generation: u64,
        outbound: mpsc::UnboundedSender<Outbound>,
        params: Value,
    ) -> Result<(u64, Settlement)> {
        if generation != self.generation || self.state != ConnectionState::Connecting {
            let _ = outbound.send(Outbound::Close {
                code: CLOSE_NORMAL,
                reason: "connect aborted".to_string(),
            });
            debug!(generation, "Connect cancelled before handshake");
            return Err(Error::ConnectionClosed {
                code: CLOSE_NORMAL,
                reason: "connect aborted".to_string(),
            });
        }
        self.outbound = Some(outbound);
        let (sequence, settlement) = self.send(RequestType::Init, params)?;
        self.init_sequence = Some(sequence);
        debug!(generation, sequence, "Handshake sent");
        Ok((sequence, settlement))
    }

    /// Abandons a connection attempt that has not synchronized.
    pub fn abort_connect(&mut self, generation: u64) {
        if generation != self.generation || self.state != ConnectionState::Connecting {
            return;
        }
        self.state = ConnectionState::Disconnected;
        self.mirror.reset();
        self.init_sequence = None;
        self.close_channel(CLOSE_NORMAL, "connect aborted");
    }

    /// Sends a request. Fails synchronously, without sending, unless
    /// synchronized.
    pub fn request(&mut self, kind: RequestType, params: Value) -> Result<(u64, Settlement)> {
        if self.state != ConnectionState::Synchronized {
            return Err(Error::NotConnected);
        }
        self.send(kind, params)
    }

    fn send(&mut self, kind: RequestType, params: Value) -> Result<(u64, Settlement)> {
        let outbound = self.outbound.as_ref().ok_or(Error::NotConnected)?;
        let text = Request::new(kind, self.pending.next_sequence(), params).to_json()?;

        let (responder, settlement) = oneshot::channel();
        let sequence = self.pending.register(responder);
        if outbound.send(Outbound::Text(text)).is_err() {
            self.pending.forget(sequence);
            return Err(TransportError::ConnectionClosed.into());
        }
        debug!(sequence, in_flight = self.pending.len(), "Call registered");
        Ok((sequence, settlement))
    }

    /// Drops a call whose caller timed out.
    pub fn forget(&mut self, generation: u64, sequence: u64) -> bool {
        generation == self.generation && self.pending.forget(sequence)
    }

    /// Asks the channel to close and disconnects at once.
    ///
    /// A handshake in flight fails with the close reason. A connect still
    /// opening its channel is cancelled. Returns the generation whose close
    /// event to wait for, or `None` when no channel is attached.
    pub fn request_close(&mut self, code: u16, reason: &str) -> Option<u64> {
        if self.state != ConnectionState::Disconnected {
            debug!(generation = self.generation, state = %self.state, "Close requested");
            self.state = ConnectionState::Disconnected;
            self.mirror.reset();
        }
        if let Some(sequence) = self.init_sequence.take() {
            self.pending.reject(
                sequence,
                Error::ConnectionClosed {
                    code,
                    reason: reason.to_string(),
                },
            );
        }
        self.close_channel(code, reason).then_some(self.generation)
    }

    fn close_channel(&mut self, code: u16, reason: &str) -> bool {
        match self.outbound.take() {
            Some(outbound) => {
                let _ = outbound.send(Outbound::Close {
                    code,
                    reason: reason.to_string(),
                });
                true
            }
            None => false,
        }
    }

    /// Processes one inbound envelope.
    ///
    /// Returns `None` when the envelope is ignored.
    pub fn dispatch(&mut self, generation: u64, envelope: Envelope) -> Option<Dispatched> {
        if generation != self.generation {
            debug!(generation, "Ignoring envelope from stale connection");
            return None;
        }
        match envelope.category {
            Category::Response => Some(self.on_response(envelope)),
            Category::Update | Category::Delete => self.on_patch(envelope),
            other => {
                debug!(category = ?other, "Ignoring envelope");
                None
            }
        }
    }

    fn on_response(&mut self, envelope: Envelope) -> Dispatched {
        let sequence = envelope.sequence;

        if self.state == ConnectionState::Connecting
            && sequence.is_some()
            && sequence == self.init_sequence
        {
            self.init_sequence = None;
            if envelope.is_success() {
                self.mirror.mark_synchronized(&envelope.data);
                self.state = ConnectionState::Synchronized;
                info!(generation = self.generation, "Synchronized");
            } else {
                warn!(reason = envelope.status_text(), "Handshake rejected");
                self.state = ConnectionState::Disconnected;
                self.close_channel(CLOSE_NORMAL, "handshake rejected");
            }
        }

        let settle = match sequence {
            Some(sequence) => {
                let outcome = if envelope.is_success() {
                    Ok(envelope.data.clone())
                } else {
                    Err(Error::Remote(envelope.status_text().to_string()))
                };
                Some((sequence, outcome))
            }
            None => {
                debug!("Ignoring response without a sequence");
                None
            }
        };

        Dispatched { envelope, settle }
    }

    /// Settles a call once the listener has seen its response.
    ///
    /// False for a stale generation or an unmatched sequence.
    pub fn settle(&mut self, generation: u64, sequence: u64, outcome: Result<Value>) -> bool {
        if generation != self.generation {
            return false;
        }
        let settled = match outcome {
            Ok(data) => self.pending.resolve(sequence, data),
            Err(e) => self.pending.reject(sequence, e),
        };
        if !settled {
            debug!(sequence, "Ignoring unmatched response");
        }
        settled
    }

    fn on_patch(&mut self, envelope: Envelope) -> Option<Dispatched> {
        if self.state != ConnectionState::Synchronized {
            debug!(category = ?envelope.category, "Dropping patch before synchronization");
            return None;
        }
        match Patch::from_envelope(&envelope) {
            Ok(Some(patch)) => {
                self.mirror.apply(&patch);
                Some(Dispatched {
                    envelope,
                    settle: None,
                })
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Ignoring malformed patch");
                None
            }
        }
    }

    /// Handles a channel error. Only a handshake in flight is affected.
    pub fn on_channel_error(&mut self, generation: u64, reason: String) {
        if generation != self.generation {
            return;
        }
        warn!(generation, %reason, "Channel error");
        if self.state != ConnectionState::Connecting {
            return;
        }
        self.state = ConnectionState::Disconnected;
        if let Some(sequence) = self.init_sequence.take() {
            self.pending
                .reject(sequence, TransportError::ReceiveFailed(reason).into());
        }
    }

    /// Tears down after the channel closed.
    ///
    /// Returns the abandoned calls, or `None` for a stale generation.
    pub fn on_close(&mut self, generation: u64) -> Option<Vec<(u64, Responder)>> {
        if generation != self.generation {
            return None;
        }
        self.state = ConnectionState::Disconnected;
        self.mirror.reset();
        self.outbound = None;
        self.init_sequence = None;
        if self.pending.is_empty() {
            return Some(Vec::new());
        }
        Some(self.pending.drain_abandoned())
    }

    fn tree(&self) -> Result<&Map<String, Value>> {
        if self.state != ConnectionState::Synchronized {
            return Err(Error::NotConnected);
        }
        self.mirror.tree().ok_or(Error::NotConnected)
    }

    /// Runs `f` against the live tree.
    pub fn read<R>(&self, f: impl FnOnce(&Map<String, Value>) -> R) -> Result<R> {
        self.tree().map(f)
    }

    pub fn robot(&self, name: &str) -> Result<&Value> {
        self.tree()?;
        self.mirror
            .robot(name)
            .ok_or_else(|| Error::NotConfigured(name.to_string()))
    }

    pub fn robot_names(&self, model: Option<&str>) -> Result<Vec<String>> {
        self.tree()?;
        Ok(self.mirror.robot_names(model))
    }

    pub fn have_control(&self, name: &str) -> Result<bool> {
        self.tree()?;
        self.mirror
            .has_control(name)
            .ok_or_else(|| Error::NotConfigured(name.to_string()))
    }
}
