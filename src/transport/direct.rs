//! In-process transport

use std::sync::Arc;

use async_trait::async_trait;

use super::Transport;
use crate::Result;
use crate::tutor::{Session, TurnOrchestrator};

/// Calls the orchestrator directly and keeps the session locally
pub struct DirectTransport {
    orchestrator: Arc<TurnOrchestrator>,
    session: Session,
}

impl DirectTransport {
    #[must_use]
    pub fn new(orchestrator: Arc<TurnOrchestrator>) -> Self {
        Self {
            orchestrator,
            session: Session::anonymous(),
        }
    }

    /// Transcript log of everything delivered so far
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }
}

#[async_trait]
impl Transport for DirectTransport {
    async fn deliver(&mut self, transcript: &str) -> Result<Vec<u8>> {
        let reply = self
            .orchestrator
            .process_and_record(&mut self.session, transcript)
            .await?;
        Ok(reply.audio)
    }
}
