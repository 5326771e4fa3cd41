// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket protocol envelopes exchanged with Edbot Studio.
//!
//! Every message on the channel is a JSON object carrying a numeric
//! `category` and, for requests and responses, a numeric `type` and a
//! `sequence` that pairs a response with its request:
//!
//! ```text
//! client ──► {category: 1, type: 1, sequence: 1, params: {...}}       REQUEST
//! server ──► {category: 2, type: 1, sequence: 1, status: {...}, data}  RESPONSE
//! server ──► {category: 3, data: {...partial tree...}}                  UPDATE
//! server ──► {category: 4, data: {path: "robots.Bob"}}                  DELETE
//! ```
//!
//! CLOSE (category 5) never crosses the wire. The client synthesizes it for
//! its local listener when the channel goes away.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

/// The role of an envelope.
///
/// Codes the client does not know decode to [`Category::Unknown`] so newer
/// servers can add categories without breaking older clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub enum Category {
    Request,
    Response,
    Update,
    Delete,
    Close,
    Unknown(u32),
}

impl From<u32> for Category {
    fn from(code: u32) -> Self {
        match code {
            1 => Category::Request,
            2 => Category::Response,
            3 => Category::Update,
            4 => Category::Delete,
            5 => Category::Close,
            other => Category::Unknown(other),
        }
    }
}

impl From<Category> for u32 {
    fn from(category: Category) -> Self {
        match category {
            Category::Request => 1,
            Category::Response => 2,
            Category::Update => 3,
            Category::Delete => 4,
            Category::Close => 5,
            Category::Unknown(code) => code,
        }
    }
}

/// The operation a request (and its response) refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub enum RequestType {
    /// Handshake. Its response seeds the state mirror.
    Init,
    GetClients,
    GetServers,
    GetSensors,
    RunMotion,
    SetServos,
    SetSpeaker,
    SetDisplay,
    SetOptions,
    SetCustom,
    Say,
    Reset,
    /// An operation this client has no named wrapper for.
    Other(u32),
}

impl From<u32> for RequestType {
    fn from(code: u32) -> Self {
        match code {
            1 => RequestType::Init,
            2 => RequestType::GetClients,
            3 => RequestType::GetServers,
            4 => RequestType::GetSensors,
            5 => RequestType::RunMotion,
            6 => RequestType::SetServos,
            7 => RequestType::SetSpeaker,
            8 => RequestType::SetDisplay,
            9 => RequestType::SetOptions,
            10 => RequestType::SetCustom,
            11 => RequestType::Say,
            12 => RequestType::Reset,
            other => RequestType::Other(other),
        }
    }
}

impl From<RequestType> for u32 {
    fn from(kind: RequestType) -> Self {
        match kind {
            RequestType::Init => 1,
            RequestType::GetClients => 2,
            RequestType::GetServers => 3,
            RequestType::GetSensors => 4,
            RequestType::RunMotion => 5,
            RequestType::SetServos => 6,
            RequestType::SetSpeaker => 7,
            RequestType::SetDisplay => 8,
            RequestType::SetOptions => 9,
            RequestType::SetCustom => 10,
            RequestType::Say => 11,
            RequestType::Reset => 12,
            RequestType::Other(code) => code,
        }
    }
}

/// Outcome record carried by every response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub success: bool,
    #[serde(default)]
    pub text: String,
}

impl Status {
    /// A successful status.
    pub fn ok() -> Self {
        Status {
            success: true,
            text: String::new(),
        }
    }

    /// A failed status with the server's explanation.
    pub fn failed(text: impl Into<String>) -> Self {
        Status {
            success: false,
            text: text.into(),
        }
    }
}

/// Parameters of the handshake request.
pub fn init_params(name: Option<&str>, reporters: bool, device_alias: Option<&str>) -> Value {
    json!({
        "name": name,
        "reporters": reporters,
        "deviceAlias": device_alias,
    })
}

/// A request sent from the client to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub category: Category,
    #[serde(rename = "type")]
    pub kind: RequestType,
    pub sequence: u64,
    /// Always serialized, as `null` when the operation takes no parameters.
    #[serde(default)]
    pub params: Value,
}

impl Request {
    /// Creates a request envelope.
    pub fn new(kind: RequestType, sequence: u64, params: Value) -> Self {
        Request {
            category: Category::Request,
            kind,
            sequence,
            params,
        }
    }

    /// Creates the handshake request.
    ///
    /// `reporters` asks the server to stream periodic sensor reports as
    /// UPDATE patches.
    pub fn init(
        sequence: u64,
        name: Option<&str>,
        reporters: bool,
        device_alias: Option<&str>,
    ) -> Self {
        Request::new(
            RequestType::Init,
            sequence,
            init_params(name, reporters, device_alias),
        )
    }

    /// Serializes the request to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes a request from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// A message received from the server, or synthesized locally for CLOSE.
///
/// This is also what the client hands to its listener callback. `type` and
/// `sequence` only mean something on requests and responses, so values that
/// are not unsigned integers decode as absent instead of failing the frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub category: Category,
    #[serde(
        rename = "type",
        default,
        deserialize_with = "lenient_kind",
        skip_serializing_if = "Option::is_none"
    )]
    pub kind: Option<RequestType>,
    #[serde(
        default,
        deserialize_with = "lenient_u64",
        skip_serializing_if = "Option::is_none"
    )]
    pub sequence: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    /// Creates a RESPONSE envelope.
    pub fn response(kind: RequestType, sequence: u64, status: Status, data: Value) -> Self {
        Envelope {
            category: Category::Response,
            kind: Some(kind),
            sequence: Some(sequence),
            status: Some(status),
            data,
        }
    }

    /// Creates an UPDATE envelope carrying a partial tree.
    pub fn update(data: Value) -> Self {
        Envelope {
            category: Category::Update,
            kind: None,
            sequence: None,
            status: None,
            data,
        }
    }

    /// Creates a DELETE envelope for a dotted path or a list of segments.
    pub fn delete(path: impl Into<Value>) -> Self {
        Envelope {
            category: Category::Delete,
            kind: None,
            sequence: None,
            status: None,
            data: json!({ "path": path.into() }),
        }
    }

    /// Creates the local CLOSE notification.
    pub fn close(code: u16, reason: impl Into<String>) -> Self {
        Envelope {
            category: Category::Close,
            kind: None,
            sequence: None,
            status: None,
            data: json!({ "code": code, "reason": reason.into() }),
        }
    }

    /// Whether a response reports success. Responses without a status count
    /// as failures.
    pub fn is_success(&self) -> bool {
        self.status.as_ref().is_some_and(|s| s.success)
    }

    /// The failure text of a response, or an empty string.
    pub fn status_text(&self) -> &str {
        self.status.as_ref().map(|s| s.text.as_str()).unwrap_or("")
    }

    /// The `path` of a DELETE envelope.
    pub fn delete_path(&self) -> Option<&Value> {
        self.data.get("path")
    }

    /// Serializes the envelope to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes an envelope from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

fn lenient_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(Value::as_u64))
}

fn lenient_kind<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<RequestType>, D::Error> {
    let code = lenient_u64(deserializer)?;
    Ok(code
        .and_then(|code| u32::try_from(code).ok())
        .map(RequestType::from))
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
