//! Conductor - The Orchestration Core
//!
//! The Conductor is the session controller of the chat. It orchestrates:
//! - Which mode is active and the provider session behind it
//! - Submitting user messages and streaming replies into the conversation
//! - Discarding replies that belong to an abandoned session
//!
//! # Design Philosophy
//!
//! The Conductor is UI-agnostic. It doesn't know or care whether it's talking
//! to a console, a web view, or a test harness. It communicates through:
//! - `SurfaceEvent`: Events received FROM the view
//! - `ConductorMessage`: Notifications published TO subscribed views
//!
//! # Generations
//!
//! Every session gets a new [`Generation`]. Streams are stamped with the
//! generation of the session that started them, and [`Conductor::apply`]
//! drops anything stamped with another one. Switching modes therefore never
//! lets a late reply leak into the new conversation.

use std::sync::Arc;

use futures::StreamExt;

use crate::backend::{ChatBackend, SessionConfig};
use crate::config::ConductorConfig;
use crate::error::{ConductorError, StoreError, StreamFailure};
use crate::events::SurfaceEvent;
use crate::messages::{ChatMessage, ConductorMessage, Generation, MessageId};
use crate::modes::{get_mode, Mode, ModeId};
use crate::security::InputValidator;
use crate::session::Session;
use crate::store::ConversationStore;
use crate::streaming::{SendEvent, SendStream, StampedEvent, StreamItem, StreamPoll};

/// A reply being streamed into a placeholder
#[derive(Debug)]
struct InFlight {
    message_id: MessageId,
    stream: SendStream,
}

/// The Conductor - headless session controller
pub struct Conductor<B: ChatBackend> {
    /// Configuration
    config: ConductorConfig,
    /// Chat backend
    backend: Arc<B>,
    /// The conversation
    store: ConversationStore,
    /// Active session, if one was started
    session: Option<Session>,
    /// Generation of the active session
    generation: Generation,
    /// Store length when the active session began
    session_start: usize,
    /// Reply currently streaming
    in_flight: Option<InFlight>,
    /// Whether a submitted request has not finished yet
    loading: bool,
    /// Input validator for submitted messages
    input_validator: InputValidator,
}

impl<B: ChatBackend> Conductor<B> {
    /// Create a new Conductor with the given backend
    ///
    /// No session exists until [`start_session`](Self::start_session) is
    /// called.
    pub fn new(backend: B, config: ConductorConfig) -> Self {
        Self::with_backend(Arc::new(backend), config)
    }

    /// Create a new Conductor sharing an existing backend
    pub fn with_backend(backend: Arc<B>, config: ConductorConfig) -> Self {
        let input_validator = InputValidator::new(config.limits.clone());
        Self {
            config,
            backend,
            store: ConversationStore::new(),
            session: None,
            generation: Generation::default(),
            session_start: 0,
            in_flight: None,
            loading: false,
            input_validator,
        }
    }

    /// Register a view for change notifications
    pub fn subscribe(&mut self) -> tokio::sync::mpsc::UnboundedReceiver<ConductorMessage> {
        self.store.subscribe()
    }

    /// Start a fresh session for a mode
    ///
    /// The previous session and any reply it was streaming are abandoned.
    /// The abandoned placeholder keeps whatever it had received. On success
    /// the mode's welcome message is appended.
    pub async fn start_session(&mut self, mode_id: ModeId) -> Result<(), ConductorError> {
        let mode = get_mode(mode_id);

        if let Some(abandoned) = self.in_flight.take() {
            tracing::debug!(
                message_id = %abandoned.message_id,
                generation = %abandoned.stream.generation(),
                "Abandoning in-flight reply"
            );
        }
        self.session = None;
        self.generation = self.generation.next();
        self.set_loading(false);

        let config = SessionConfig::for_mode(mode, self.config.temperature);
        let handle = self
            .backend
            .create_session(config.clone())
            .await
            .map_err(ConductorError::SessionCreation)?;

        let session = Session::new(mode_id, self.generation, config, handle);
        tracing::info!(
            session_id = %session.id,
            mode = %mode_id,
            model = mode.model,
            generation = %self.generation,
            backend = self.backend.name(),
            "Session started"
        );
        self.session = Some(session);

        self.store.publish(ConductorMessage::ModeChanged {
            mode: mode_id,
            generation: self.generation,
        });
        self.session_start = self.store.len();
        self.store.append_bot(mode.welcome_text());
        Ok(())
    }

    /// Forward a user turn to the active session and return its reply stream
    ///
    /// This does not touch the conversation; use [`submit`](Self::submit)
    /// for the full send flow. A provider error before the reply starts is
    /// reported as a stream that fails immediately.
    pub async fn send(&mut self, text: &str) -> Result<SendStream, ConductorError> {
        let session = self.session.as_mut().ok_or(ConductorError::NotInitialized)?;
        if text.trim().is_empty() {
            return Err(ConductorError::EmptyInput);
        }

        let generation = session.generation;
        match session.send_stream(text).await {
            Ok(receiver) => Ok(SendStream::new(generation, receiver)),
            Err(e) => {
                let reason = format!("{e:#}");
                tracing::warn!(generation = %generation, error = %reason, "Request failed");
                Ok(SendStream::failed(generation, StreamFailure::new(reason)))
            }
        }
    }

    /// Submit a user message
    ///
    /// Appends the user message and an empty bot placeholder, sets the
    /// loading flag and starts streaming the reply into the placeholder.
    /// Returns the placeholder's ID. Rejected submissions change nothing.
    pub async fn submit(&mut self, text: &str) -> Result<MessageId, ConductorError> {
        if self.session.is_none() {
            return Err(ConductorError::NotInitialized);
        }
        if text.trim().is_empty() {
            return Err(ConductorError::EmptyInput);
        }
        if self.loading {
            return Err(ConductorError::RequestInFlight);
        }
        if let Some(reason) = self.input_validator.validate_message(text).error_message() {
            tracing::warn!(reason = %reason, "Rejected user message");
            return Err(ConductorError::InvalidInput(reason.to_string()));
        }

        self.store.append_user(text);
        let placeholder = self.store.append_bot_placeholder();
        self.set_loading(true);

        let stream = self.send(text).await?;
        self.in_flight = Some(InFlight {
            message_id: placeholder.clone(),
            stream,
        });
        Ok(placeholder)
    }

    /// Apply one stamped event to a bot message
    ///
    /// Events from another generation are dropped and `Ok(false)` is
    /// returned. Terminal items finish the in-flight request when `target`
    /// is its placeholder.
    pub fn apply(&mut self, target: &MessageId, event: StampedEvent) -> Result<bool, StoreError> {
        if event.generation != self.generation {
            tracing::trace!(
                event_generation = %event.generation,
                active_generation = %self.generation,
                message_id = %target,
                "Dropping stale stream event"
            );
            return Ok(false);
        }

        match event.item {
            StreamItem::Event(SendEvent::TextDelta(text)) => {
                self.store.apply_text_delta(target, &text)?;
            }
            StreamItem::Event(SendEvent::Grounding(references)) => {
                tracing::debug!(message_id = %target, count = references.len(), "Grounding received");
                self.store.apply_grounding(target, references)?;
            }
            StreamItem::Completed => {
                let result = self.store.mark_complete(target);
                self.finish(target);
                result?;
                tracing::debug!(message_id = %target, "Reply complete");
            }
            StreamItem::Failed(failure) => {
                tracing::warn!(message_id = %target, reason = failure.reason(), "Reply failed");
                let result = self.store.mark_error(target);
                self.finish(target);
                result?;
            }
        }
        Ok(true)
    }

    /// Wait for the next item of the in-flight reply and apply it
    ///
    /// Returns `false` when nothing is streaming.
    pub async fn step(&mut self) -> Result<bool, ConductorError> {
        let Some(in_flight) = self.in_flight.as_mut() else {
            return Ok(false);
        };
        let target = in_flight.message_id.clone();

        let next = in_flight.stream.next().await;
        match next {
            Some(event) => Ok(self.apply(&target, event)?),
            None => {
                self.finish(&target);
                Ok(false)
            }
        }
    }

    /// Stream the in-flight reply to its end
    pub async fn drive(&mut self) -> Result<(), ConductorError> {
        while self.in_flight.is_some() {
            self.step().await?;
        }
        Ok(())
    }

    /// Apply every reply item that is ready, without waiting
    ///
    /// Call this regularly from a render loop.
    /// Returns true if there was activity.
    pub fn poll_streaming(&mut self) -> bool {
        let mut activity = false;

        while let Some(in_flight) = self.in_flight.as_mut() {
            let target = in_flight.message_id.clone();
            let polled = in_flight.stream.try_recv();
            match polled {
                StreamPoll::Item(event) => {
                    activity = true;
                    if let Err(e) = self.apply(&target, event) {
                        tracing::warn!(error = %e, "Failed to apply stream event");
                    }
                }
                StreamPoll::Idle => break,
                StreamPoll::Ended => self.finish(&target),
            }
        }

        activity
    }

    /// Handle an event from a view
    ///
    /// Rejected submissions are published as
    /// [`ConductorMessage::InputRejected`] rather than returned.
    pub async fn handle_event(&mut self, event: SurfaceEvent) -> Result<(), ConductorError> {
        match event {
            SurfaceEvent::UserMessage { content } => self.submit_or_reject(&content).await,
            SurfaceEvent::ModeSelected { mode } => self.start_session(mode).await,
            SurfaceEvent::SuggestionSelected { index } => {
                let Some(mode) = self.current_mode() else {
                    return self.reject(ConductorError::NotInitialized);
                };
                match mode.suggested_queries.get(index) {
                    Some(query) => self.submit_or_reject(query).await,
                    None => self.reject(ConductorError::InvalidInput(format!(
                        "no suggestion at position {index}"
                    ))),
                }
            }
        }
    }

    async fn submit_or_reject(&mut self, text: &str) -> Result<(), ConductorError> {
        match self.submit(text).await {
            Ok(_) => Ok(()),
            Err(e) => self.reject(e),
        }
    }

    fn reject(&mut self, error: ConductorError) -> Result<(), ConductorError> {
        match error {
            ConductorError::NotInitialized
            | ConductorError::EmptyInput
            | ConductorError::RequestInFlight
            | ConductorError::InvalidInput(_) => {
                tracing::debug!(reason = %error, "Input rejected");
                self.store.publish(ConductorMessage::InputRejected {
                    reason: error.to_string(),
                });
                Ok(())
            }
            other => Err(other),
        }
    }

    /// Clear the in-flight request if `target` is its placeholder
    fn finish(&mut self, target: &MessageId) {
        if self
            .in_flight
            .as_ref()
            .is_some_and(|f| &f.message_id == target)
        {
            self.in_flight = None;
            self.set_loading(false);
        }
    }

    fn set_loading(&mut self, loading: bool) {
        if self.loading != loading {
            self.loading = loading;
            self.store.publish(ConductorMessage::Loading { loading });
        }
    }

    /// Active mode, if a session exists
    pub fn mode(&self) -> Option<ModeId> {
        self.session.as_ref().map(|s| s.mode)
    }

    /// Active mode's configuration, if a session exists
    pub fn current_mode(&self) -> Option<&'static Mode> {
        self.mode().map(get_mode)
    }

    /// Active session
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Current generation
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Whether a submitted request has not finished yet
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Whether a reply is streaming
    pub fn is_streaming(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Suggested queries to offer, if any
    ///
    /// Suggestions are offered only at the start of a session, before
    /// anything beyond the welcome message, and never while loading.
    pub fn suggestions(&self) -> &'static [&'static str] {
        match self.current_mode() {
            Some(mode) if !self.loading && self.store.len() - self.session_start < 2 => {
                mode.suggested_queries
            }
            _ => &[],
        }
    }

    /// The conversation store
    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    /// All messages in chat order
    pub fn messages(&self) -> &[ChatMessage] {
        self.store.messages()
    }

    /// Configuration
    pub fn config(&self) -> &ConductorConfig {
        &self.config
    }
}
