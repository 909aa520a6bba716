//! Chat Backend Integration
//!
//! This module provides abstracted access to chat providers through a common
//! trait interface.
//!
//! # Available Backends
//!
//! - **Gemini**: Google's Generative Language API, streamed over SSE
//!
//! # Usage
//!
//! ```ignore
//! use comex_conductor::backend::{ChatBackend, GeminiBackend, SessionConfig};
//! use comex_conductor::modes::{get_mode, ModeId};
//!
//! let backend = GeminiBackend::new(&config.backend)?;
//! let mut session = backend
//!     .create_session(SessionConfig::for_mode(get_mode(ModeId::General), 0.7))
//!     .await?;
//! let rx = session.send_stream("Como funciona o Drawback?").await?;
//! ```

mod gemini;
mod traits;

pub use gemini::{GeminiBackend, GeminiSession};
pub use traits::{
    ChatBackend, ChatSessionHandle, GroundingMetadata, ProviderChunk, ProviderEvent,
    SessionConfig, SourceKind, SourceReference,
};
