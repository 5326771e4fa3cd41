// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! edbot-core: Shared library for the Edbot Studio client
//!
//! This crate provides the wire protocol envelopes, the client-side state
//! mirror with its merge/delete patch rules, and raw sensor conversions.
//! It has no async runtime; `edbot-client` drives it over a live channel.

pub mod error;
pub mod mirror;
pub mod protocol;
pub mod sensor;

pub use error::{Error, Result};
pub use mirror::{parse_path, Patch, StateMirror};
pub use protocol::{init_params, Category, Envelope, Request, RequestType, Status};
