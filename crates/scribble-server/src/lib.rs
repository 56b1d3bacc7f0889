//! Scribble Quest server
//!
//! Serves the game engine over a small JSON API and sweeps idle sessions in
//! the background. The `scribble-quest` binary wires this crate to the
//! OpenAI-compatible capability backend.

#![warn(unreachable_pub)]

pub mod config;
pub mod logging;
pub mod routes;

pub use config::{LoadError, ServerConfig, ServerSettings};

use scribble_core::ProgressionEngine;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Periodically drop idle-expired sessions
pub fn spawn_sweeper(engine: ProgressionEngine, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            engine.purge_expired().await;
            tracing::debug!(sessions = engine.sessions().len(), "session sweep");
        }
    })
}
