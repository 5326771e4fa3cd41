// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Client-side mirror of the server's state tree.
//!
//! Patch rules:
//! - UPDATE: deep merge. Objects merge recursively, everything else
//!   (scalars, `null`, arrays) replaces the existing value wholesale.
//! - DELETE: remove the value at a path, siblings untouched. A missing path
//!   is a no-op. An array element is replaced by `null` so the array keeps
//!   its length.
//!
//! Patches are only accepted once the mirror is synchronized, i.e. after the
//! handshake response has seeded it. Earlier patches are dropped, never
//! queued.

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Error, Result};
use crate::protocol::{Category, Envelope};

/// A parsed state patch.
#[derive(Debug, Clone, PartialEq)]
pub enum Patch {
    /// Partial tree to deep-merge.
    Update(Value),
    /// Path segments of the value to remove.
    Delete(Vec<String>),
}

impl Patch {
    /// Extracts the patch carried by an UPDATE or DELETE envelope.
    ///
    /// Returns `Ok(None)` for any other category.
    pub fn from_envelope(envelope: &Envelope) -> Result<Option<Patch>> {
        match envelope.category {
            Category::Update => Ok(Some(Patch::Update(envelope.data.clone()))),
            Category::Delete => {
                let path = envelope
                    .delete_path()
                    .ok_or_else(|| Error::InvalidPath("missing path".to_string()))?;
                Ok(Some(Patch::Delete(parse_path(path)?)))
            }
            _ => Ok(None),
        }
    }
}

/// In-memory copy of the server-authoritative state.
#[derive(Debug, Clone, Default)]
pub struct StateMirror {
    tree: Map<String, Value>,
    synchronized: bool,
}

impl StateMirror {
    /// Creates an empty, unsynchronized mirror.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears the tree and stops accepting patches.
    pub fn reset(&mut self) {
        self.tree.clear();
        self.synchronized = false;
    }

    /// Seeds the tree with the handshake data and starts accepting patches.
    pub fn mark_synchronized(&mut self, initial: &Value) {
        if let Value::Object(initial) = initial {
            merge_map(&mut self.tree, initial);
        }
        self.synchronized = true;
    }

    /// Whether the handshake data has been applied.
    pub fn is_synchronized(&self) -> bool {
        self.synchronized
    }

    /// Applies a patch. Returns whether it took effect.
    pub fn apply(&mut self, patch: &Patch) -> bool {
        match patch {
            Patch::Update(data) => self.apply_update(data),
            Patch::Delete(path) => self.apply_delete(path),
        }
    }

    /// Deep-merges a partial tree.
    ///
    /// Returns false when the mirror is not synchronized or the patch is not
    /// an object.
    pub fn apply_update(&mut self, patch: &Value) -> bool {
        if !self.synchronized {
            debug!("Dropping update received before synchronization");
            return false;
        }
        match patch {
            Value::Object(patch) => {
                merge_map(&mut self.tree, patch);
                true
            }
            other => {
                debug!(patch = %other, "Ignoring non-object update");
                false
            }
        }
    }

    /// Removes the value at `path`.
    ///
    /// Returns false when the mirror is not synchronized or nothing was
    /// there to remove.
    pub fn apply_delete(&mut self, path: &[String]) -> bool {
        if !self.synchronized {
            debug!(path = ?path, "Dropping delete received before synchronization");
            return false;
        }
        remove_path(&mut self.tree, path)
    }

    /// The live tree, or `None` before synchronization.
    pub fn tree(&self) -> Option<&Map<String, Value>> {
        self.synchronized.then_some(&self.tree)
    }

    /// Looks up a value by path segments.
    pub fn get(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        let mut cursor = self.tree.get(*first)?;
        for segment in rest {
            cursor = child(cursor, segment)?;
        }
        Some(cursor)
    }

    /// The registry entry of a robot.
    pub fn robot(&self, name: &str) -> Option<&Value> {
        self.get(&["robots", name])
    }

    /// Names of the configured robots, optionally limited to one model type.
    ///
    /// When filtering, a robot's own `name` field is preferred over its
    /// registry key.
    pub fn robot_names(&self, model: Option<&str>) -> Vec<String> {
        let Some(Value::Object(robots)) = self.tree.get("robots") else {
            return Vec::new();
        };
        match model {
            None => robots.keys().cloned().collect(),
            Some(model) => robots
                .iter()
                .filter(|(_, robot)| {
                    robot.pointer("/model/type").and_then(Value::as_str) == Some(model)
                })
                .map(|(key, robot)| {
                    robot
                        .get("name")
                        .and_then(Value::as_str)
                        .unwrap_or(key.as_str())
                        .to_string()
                })
                .collect(),
        }
    }

    /// Identity of this client's device as assigned by the server.
    pub fn device_id(&self) -> Option<&Value> {
        self.get(&["session", "device", "id"])
    }

    /// Whether the named robot is controlled by this device.
    ///
    /// `None` when the robot is not configured. A robot with no `control`
    /// owner, or a session without a device id, is not under our control.
    pub fn has_control(&self, name: &str) -> Option<bool> {
        let robot = self.robot(name)?;
        let owner = robot.get("control").filter(|v| !v.is_null());
        Some(match (owner, self.device_id()) {
            (Some(owner), Some(device)) => owner == device,
            _ => false,
        })
    }
}

/// Parses a delete path.
///
/// Accepts a dotted string with optional bracket indices
/// (`robots.Bob.servos[3].speed`) or an array of string/number segments.
pub fn parse_path(path: &Value) -> Result<Vec<String>> {
    let segments = match path {
        Value::String(s) => split_path(s)?,
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                Value::Number(n) => Ok(n.to_string()),
                other => Err(Error::InvalidPath(other.to_string())),
            })
            .collect::<Result<Vec<_>>>()?,
        other => return Err(Error::InvalidPath(other.to_string())),
    };
    if segments.is_empty() {
        return Err(Error::InvalidPath(path.to_string()));
    }
    Ok(segments)
}

fn split_path(path: &str) -> Result<Vec<String>> {
    let invalid = || Error::InvalidPath(path.to_string());
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = path.chars();
    // Set after `]` so that `a[0].b` does not see an empty segment before `.`.
    let mut after_bracket = false;

    while let Some(c) = chars.next() {
        match c {
            '.' => {
                if current.is_empty() && !after_bracket {
                    return Err(invalid());
                }
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
                after_bracket = false;
            }
            '[' => {
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
                let mut inner = String::new();
                loop {
                    match chars.next() {
                        Some(']') => break,
                        Some(c) => inner.push(c),
                        None => return Err(invalid()),
                    }
                }
                let inner = inner.trim_matches(|c| c == '"' || c == '\'');
                if inner.is_empty() {
                    return Err(invalid());
                }
                segments.push(inner.to_string());
                after_bracket = true;
            }
            c => {
                current.push(c);
                after_bracket = false;
            }
        }
    }

    if !current.is_empty() {
        segments.push(current);
    } else if !after_bracket {
        return Err(invalid());
    }
    Ok(segments)
}

fn merge_map(target: &mut Map<String, Value>, patch: &Map<String, Value>) {
    for (key, value) in patch {
        match (target.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                merge_map(existing, incoming);
            }
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

fn child<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

fn child_mut<'a>(value: &'a mut Value, segment: &str) -> Option<&'a mut Value> {
    match value {
        Value::Object(map) => map.get_mut(segment),
        Value::Array(items) => segment
            .parse::<usize>()
            .ok()
            .and_then(move |i| items.get_mut(i)),
        _ => None,
    }
}

fn remove_path(tree: &mut Map<String, Value>, path: &[String]) -> bool {
    let Some((last, parents)) = path.split_last() else {
        return false;
    };
    let Some((first, rest)) = parents.split_first() else {
        return tree.remove(last).is_some();
    };

    let Some(mut cursor) = tree.get_mut(first) else {
        return false;
    };
    for segment in rest {
        match child_mut(cursor, segment) {
            Some(next) => cursor = next,
            None => return false,
        }
    }

    match cursor {
        Value::Object(map) => map.remove(last).is_some(),
        Value::Array(items) => match last.parse::<usize>().ok().and_then(|i| items.get_mut(i)) {
            Some(slot) => {
                *slot = Value::Null;
                true
            }
            None => false,
        },
        _ => false,
    }
}

#[cfg(test)]
#[path = "mirror_tests.rs"]
mod tests;
