//! Transport adapters: how a transcript reaches the orchestrator
//!
//! Every deployment picks exactly one adapter. The orchestrator never
//! branches on the mechanism.
//!
//! - [`DirectTransport`]: in-process call
//! - [`RelayClient`]: persistent WebSocket to a relay server
//! - the relay server itself and the request/response HTTP adapter live
//!   in [`crate::api`]

mod direct;
mod relay_client;
pub mod wire;

pub use direct::DirectTransport;
pub use relay_client::RelayClient;
pub use wire::{ErrorFrame, TranscriptFrame};

use async_trait::async_trait;

use crate::Result;

/// Delivers one transcript and returns the synthesized reply audio
#[async_trait]
pub trait Transport: Send {
    /// Deliver `transcript` and wait for its audio
    ///
    /// # Errors
    ///
    /// Returns the turn's typed failure (`EmptyInput`, `Inference`,
    /// `Synthesis`) or `Transport` when the channel itself fails
    async fn deliver(&mut self, transcript: &str) -> Result<Vec<u8>>;
}
