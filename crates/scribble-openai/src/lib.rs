//! OpenAI-compatible backends for Scribble Quest
//!
//! One [`OpenAiClient`] implements all three capability traits:
//! - text generation via `POST /chat/completions`
//! - vision scoring via `POST /chat/completions` with an inline PNG
//! - image generation via `POST /images/generations`
//!
//! HTTP failures are mapped onto [`scribble_core::CapabilityError`]; retries
//! and timeouts around each call belong to the core's retry layer.

#![warn(unreachable_pub)]

pub mod client;
pub mod config;
pub mod http;
pub mod wire;

pub use client::{OpenAiClient, OpenAiError};
pub use config::OpenAiConfig;

use scribble_core::Capabilities;
use std::sync::Arc;

/// Capabilities backed by a single client
#[must_use]
pub fn capabilities(client: OpenAiClient) -> Capabilities {
    let client = Arc::new(client);
    Capabilities::new(client.clone(), client.clone(), client)
}
