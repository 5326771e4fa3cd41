// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Outstanding requests awaiting a response, keyed by sequence number.
//!
//! Each connection owns one table. Sequences start at 1 and are never reused
//! within the table's lifetime; a reconnect installs a fresh table.

use std::collections::BTreeMap;

use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::{Error, Result};

/// Settles one call.
pub(crate) type Responder = oneshot::Sender<Result<Value>>;

/// Calls awaiting a response on one connection.
#[derive(Debug)]
pub(crate) struct PendingCalls {
    next: u64,
    calls: BTreeMap<u64, Responder>,
}

impl Default for PendingCalls {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingCalls {
    pub fn new() -> Self {
        PendingCalls {
            next: 1,
            calls: BTreeMap::new(),
        }
    }

    /// The sequence the next [`register`](Self::register) will assign.
    pub fn next_sequence(&self) -> u64 {
        self.next
    }

    /// Stores a responder under a fresh sequence number.
    pub fn register(&mut self, responder: Responder) -> u64 {
        let sequence = self.next;
        self.next = self.next.checked_add(1).unwrap_or(1);
        self.calls.insert(sequence, responder);
        sequence
    }

    /// Settles a call with response data. False if no such call.
    pub fn resolve(&mut self, sequence: u64, data: Value) -> bool {
        self.settle(sequence, Ok(data))
    }

    /// Settles a call with an error. False if no such call.
    pub fn reject(&mut self, sequence: u64, error: Error) -> bool {
        self.settle(sequence, Err(error))
    }

    /// Drops a call whose caller stopped waiting.
    pub fn forget(&mut self, sequence: u64) -> bool {
        self.calls.remove(&sequence).is_some()
    }

    /// Empties the table, returning calls in sequence order.
    pub fn drain_abandoned(&mut self) -> Vec<(u64, Responder)> {
        std::mem::take(&mut self.calls).into_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    fn settle(&mut self, sequence: u64, outcome: Result<Value>) -> bool {
        match self.calls.remove(&sequence) {
            Some(responder) => {
                // The caller may have given up; that is not our concern.
                let _ = responder.send(outcome);
                true
            }
            None => false,
        }
    }
}
