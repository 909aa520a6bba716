//! Chat Backend Traits
//!
//! Trait definitions for chat providers. The Conductor only ever talks to a
//! [`ChatBackend`] and the [`ChatSessionHandle`]s it creates, so tests can
//! script a provider without any network access.
//!
//! # Design Philosophy
//!
//! A backend is a factory for stateful sessions. Each session owns its
//! provider-side history; sending a user turn returns a channel of
//! [`ProviderEvent`]s that closes when the reply is finished.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::modes::{Mode, Tool};

/// Where a grounding source came from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    /// A web page found by search
    Web,
    /// Anything else the provider may cite (retrieved context and the like)
    Other,
}

/// One source entry in a chunk's grounding metadata
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceReference {
    /// Kind of source
    pub source_kind: SourceKind,
    /// Source URI
    pub uri: String,
    /// Source title, when the provider sent one
    pub title: Option<String>,
}

impl SourceReference {
    /// A web source
    pub fn web(uri: impl Into<String>, title: Option<&str>) -> Self {
        Self {
            source_kind: SourceKind::Web,
            uri: uri.into(),
            title: title.map(str::to_string),
        }
    }

    /// A non-web source
    pub fn other(uri: impl Into<String>, title: Option<&str>) -> Self {
        Self {
            source_kind: SourceKind::Other,
            uri: uri.into(),
            title: title.map(str::to_string),
        }
    }
}

/// Grounding metadata attached to a chunk
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GroundingMetadata {
    /// Source entries, in provider order
    pub references: Vec<SourceReference>,
}

/// One raw unit of a streamed reply
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProviderChunk {
    /// Text fragment, if any
    pub text: Option<String>,
    /// Grounding metadata, if any
    pub grounding_metadata: Option<GroundingMetadata>,
}

impl ProviderChunk {
    /// A chunk carrying only text
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            grounding_metadata: None,
        }
    }

    /// A chunk carrying only grounding metadata
    pub fn grounding(references: Vec<SourceReference>) -> Self {
        Self {
            text: None,
            grounding_metadata: Some(GroundingMetadata { references }),
        }
    }

    /// Attach grounding metadata to this chunk
    #[must_use]
    pub fn with_grounding(mut self, references: Vec<SourceReference>) -> Self {
        self.grounding_metadata = Some(GroundingMetadata { references });
        self
    }
}

/// Events on a session's reply channel
///
/// The channel closing after any number of `Chunk`s means the reply
/// finished. `Failed` is always the last event sent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProviderEvent {
    /// A piece of the reply
    Chunk(ProviderChunk),
    /// The reply failed; the reason is for logs
    Failed(String),
}

/// Everything a backend needs to open a session for a mode
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Model identifier
    pub model: String,
    /// System instruction sent with every request
    pub system_instruction: String,
    /// Enabled provider tools
    pub tools: Vec<Tool>,
    /// Sampling temperature
    pub temperature: f32,
}

impl SessionConfig {
    /// Build the configuration for a mode
    pub fn for_mode(mode: &Mode, temperature: f32) -> Self {
        Self {
            model: mode.model.to_string(),
            system_instruction: mode.system_instruction(),
            tools: mode.tools.to_vec(),
            temperature,
        }
    }
}

/// Chat Backend trait
///
/// Implement this trait to add support for a chat provider.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Get the backend name (e.g., "Gemini")
    fn name(&self) -> &str;

    /// Open a new session with empty history
    async fn create_session(
        &self,
        config: SessionConfig,
    ) -> anyhow::Result<Box<dyn ChatSessionHandle>>;
}

/// A provider-side conversation
#[async_trait]
pub trait ChatSessionHandle: Send {
    /// Send the next user turn and stream the reply
    ///
    /// Returns a channel receiver that yields events as they arrive. Dropping
    /// the receiver abandons the reply.
    async fn send_stream(&mut self, text: &str) -> anyhow::Result<mpsc::Receiver<ProviderEvent>>;

    /// Number of turns in the provider-side history
    fn history_len(&self) -> usize;
}
