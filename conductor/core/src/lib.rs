//! Comex Conductor - Headless Chat Session Controller for ComexGlobal AI
//!
//! This crate provides the core chat logic for ComexGlobal AI, a
//! foreign-trade assistant backed by Gemini, completely independent of any
//! UI framework. It can drive a console, a web view, or run headless for
//! testing.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                            Views                                │
//! │        ┌───────────┐    ┌───────────┐    ┌───────────────┐      │
//! │        │  Console  │    │  Web view │    │ Test harness  │      │
//! │        └─────┬─────┘    └─────┬─────┘    └───────┬───────┘      │
//! │              └────────────────┴──────────────────┘              │
//! │                               │                                 │
//! │                      SurfaceEvent (up)                          │
//! │                   ConductorMessage (down)                       │
//! └───────────────────────────────┼─────────────────────────────────┘
//!                                 │
//! ┌───────────────────────────────┼─────────────────────────────────┐
//! │                        CONDUCTOR CORE                           │
//! │  ┌────────────────────────────┴──────────────────────────────┐  │
//! │  │                        Conductor                          │  │
//! │  │  ┌──────────┐  ┌──────────────┐  ┌─────────┐  ┌────────┐  │  │
//! │  │  │  Modes   │  │ Conversation │  │ Session │  │ Stream │  │  │
//! │  │  │ Registry │  │    Store     │  │ (gen N) │  │ Demux  │  │  │
//! │  │  └──────────┘  └──────────────┘  └────┬────┘  └────────┘  │  │
//! │  └───────────────────────────────────────┼───────────────────┘  │
//! │                                          │                      │
//! │                             ChatBackend (Gemini, SSE)           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`Conductor`]: Owns the active session and drives replies into the store
//! - [`ConversationStore`]: The ordered message list views render
//! - [`ConductorMessage`]: Notifications published to subscribed views
//! - [`SurfaceEvent`]: Events sent from views to the Conductor
//! - [`Mode`]: Static persona, model and tool configuration
//!
//! # Quick Start
//!
//! ```ignore
//! use comex_conductor::{backend::GeminiBackend, Conductor, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let backend = GeminiBackend::new(&config.backend)?;
//!     let mut conductor = Conductor::new(backend, config.conductor.clone());
//!     let mut updates = conductor.subscribe();
//!
//!     conductor.start_session(config.conductor.initial_mode).await?;
//!     conductor.submit("Qual a NCM para smartphones?").await?;
//!     conductor.drive().await?;
//!
//!     while let Ok(update) = updates.try_recv() {
//!         // Render update
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`modes`]: Mode registry
//! - [`conductor`]: Session controller
//! - [`store`]: Conversation state store
//! - [`streaming`]: Stream demultiplexer and generation-stamped reply streams
//! - [`backend`]: Chat backend abstraction and the Gemini implementation
//! - [`messages`]: Conversation data model and notifications to views
//! - [`events`]: Events from views to the Conductor
//! - [`session`]: The active provider session
//! - [`security`]: Input validation
//! - [`config`]: Configuration loading
//! - [`error`]: Error types
//!
//! # No UI Dependencies
//!
//! This crate has **zero** dependencies on any UI framework. It's pure
//! business logic that can be used anywhere.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod conductor;
pub mod config;
pub mod error;
pub mod events;
pub mod messages;
pub mod modes;
pub mod security;
pub mod session;
pub mod store;
pub mod streaming;

// Re-exports for convenience
pub use backend::{ChatBackend, ChatSessionHandle, GeminiBackend, ProviderChunk, ProviderEvent};
pub use conductor::Conductor;
pub use config::{ApiKey, BackendConfig, Config, ConductorConfig, ConfigError};
pub use error::{ConductorError, StoreError, StreamFailure};
pub use events::SurfaceEvent;
pub use messages::{
    ChatMessage, ConductorMessage, Generation, GroundingReference, MessageId, MessageStatus,
    Sender, SessionId, STREAM_ERROR_TEXT,
};
pub use modes::{all_modes, get_mode, Mode, ModeId, Tool};
pub use security::{ConductorLimits, InputValidator, ValidationResult};
pub use session::Session;
pub use store::ConversationStore;
pub use streaming::{DemuxedChunk, SendEvent, SendStream, StampedEvent, StreamItem};
