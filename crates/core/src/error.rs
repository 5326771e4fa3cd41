// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for edbot-core operations.

use thiserror::Error;

/// All possible errors that can occur in edbot-core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid path: {0}\n  hint: use a dotted string like 'robots.Bob.control' or a list of segments")]
    InvalidPath(String),

    #[error("raw value {raw} is outside the permitted range [{min} - {max}]")]
    OutOfRange { raw: u16, min: u16, max: u16 },
}

/// A specialized Result type for edbot-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
