//! Session Management
//!
//! A session is one provider-side conversation bound to a single mode. It
//! starts with empty history and lives until the user picks a mode again,
//! at which point the Conductor discards it and opens a fresh one.

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::backend::{ChatSessionHandle, ProviderEvent, SessionConfig};
use crate::messages::{Generation, SessionId};
use crate::modes::ModeId;

/// The active chat session
pub struct Session {
    /// Unique session ID
    pub id: SessionId,
    /// Mode the session was created for
    pub mode: ModeId,
    /// Generation stamped on every stream this session produces
    pub generation: Generation,
    /// Configuration the session was created with
    pub config: SessionConfig,
    /// When the session was created
    pub created_at: DateTime<Utc>,
    handle: Box<dyn ChatSessionHandle>,
}

impl Session {
    pub(crate) fn new(
        mode: ModeId,
        generation: Generation,
        config: SessionConfig,
        handle: Box<dyn ChatSessionHandle>,
    ) -> Self {
        Self {
            id: SessionId::new(),
            mode,
            generation,
            config,
            created_at: Utc::now(),
            handle,
        }
    }

    /// Number of turns in the provider-side history
    pub fn history_len(&self) -> usize {
        self.handle.history_len()
    }

    /// Forward a user turn to the provider
    pub(crate) async fn send_stream(
        &mut self,
        text: &str,
    ) -> anyhow::Result<mpsc::Receiver<ProviderEvent>> {
        tracing::debug!(
            session_id = %self.id,
            generation = %self.generation,
            model = %self.config.model,
            "Sending user turn"
        );
        self.handle.send_stream(text).await
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("mode", &self.mode)
            .field("generation", &self.generation)
            .field("model", &self.config.model)
            .field("created_at", &self.created_at)
            .field("history_len", &self.history_len())
            .finish()
    }
}
