//! Conductor Messages
//!
//! The conversation data model and the notifications the Conductor sends to
//! whatever view is rendering the conversation.
//!
//! # Design Philosophy
//!
//! Views are pure renderers. They read [`ChatMessage`]s and react to
//! [`ConductorMessage`] notifications; they never mutate conversation state
//! themselves. This keeps the core testable without any rendering framework.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::modes::ModeId;

/// Text that replaces a bot message whose stream failed. Raw provider errors
/// are never shown to the user.
pub const STREAM_ERROR_TEXT: &str =
    "Desculpe, ocorreu um erro ao processar sua solicitação. Por favor, tente novamente.";

/// Notifications from the Conductor to views
///
/// Published synchronously, in the order the underlying state changed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ConductorMessage {
    /// A message was appended to the conversation
    MessageAppended {
        /// Snapshot of the message at append time
        message: ChatMessage,
    },

    /// Text was appended to a streaming bot message
    TextDelta {
        /// Message being streamed
        message_id: MessageId,
        /// The appended fragment
        text: String,
    },

    /// Grounding references were appended to a bot message
    Grounding {
        /// Message being streamed
        message_id: MessageId,
        /// The newly appended references, in arrival order
        references: Vec<GroundingReference>,
    },

    /// A bot message finished streaming
    StreamEnd {
        /// Message that completed
        message_id: MessageId,
    },

    /// A bot message failed and now carries [`STREAM_ERROR_TEXT`]
    StreamError {
        /// Message that failed
        message_id: MessageId,
    },

    /// A new session was started for a mode
    ModeChanged {
        /// The selected mode
        mode: ModeId,
        /// Generation of the new session
        generation: Generation,
    },

    /// The loading flag changed
    Loading {
        /// Whether a request is in flight
        loading: bool,
    },

    /// A submission was rejected without touching the conversation
    InputRejected {
        /// Human-readable reason
        reason: String,
    },
}

/// Message identifier
///
/// Derived from creation time plus a process-wide counter, so identifiers
/// sort in creation order and never collide within a conversation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    /// Generate a new unique message ID
    pub fn new() -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let count = COUNTER.fetch_add(1, Ordering::SeqCst);
        let timestamp = Utc::now().timestamp_millis();
        Self(format!("msg_{timestamp:013}_{count:08}"))
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Session identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    /// Generate a new unique session ID
    ///
    /// Uses an atomic counter combined with timestamp to ensure uniqueness
    /// even when multiple sessions are created in the same millisecond.
    pub fn new() -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};

        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let count = COUNTER.fetch_add(1, Ordering::SeqCst);
        let timestamp = Utc::now().timestamp_millis();
        Self(format!("session_{timestamp}_{count}"))
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tag identifying which session an in-flight stream belongs to
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Generation(pub u64);

impl Generation {
    /// The generation after this one
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who sent a message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sender {
    /// User input
    User,
    /// The assistant
    Bot,
    /// Local system notice
    System,
}

/// Lifecycle of a message
///
/// User and system messages are created `Complete`. Bot replies start
/// `Pending`, move to `Streaming` on the first event, and end in one of the
/// two terminal states.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageStatus {
    /// Placeholder, nothing received yet
    Pending,
    /// Receiving text or grounding events
    Streaming,
    /// Finished without error
    Complete,
    /// Finished with an error
    Errored,
}

impl MessageStatus {
    /// Whether no further transition is possible
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Errored)
    }
}

/// A citation the provider attached to a response
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundingReference {
    /// Source URI
    pub uri: String,
    /// Optional source title
    pub title: Option<String>,
}

impl GroundingReference {
    /// Create a reference
    pub fn new(uri: impl Into<String>, title: Option<String>) -> Self {
        Self {
            uri: uri.into(),
            title,
        }
    }

    /// Title for display: the stored title, else the URI's host, else the
    /// raw URI
    #[must_use]
    pub fn display_title(&self) -> String {
        if let Some(title) = self.title.as_deref().filter(|t| !t.trim().is_empty()) {
            return title.to_string();
        }
        url::Url::parse(&self.uri)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| self.uri.clone())
    }
}

/// A message in the conversation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Unique message ID
    pub id: MessageId,
    /// Who sent this message
    pub sender: Sender,
    /// Message text (Markdown for bot messages)
    pub text: String,
    /// When the message was created
    pub timestamp: DateTime<Utc>,
    /// Lifecycle status
    pub status: MessageStatus,
    /// Whether the message ended in error
    pub is_error: bool,
    /// Grounding references, in arrival order
    pub grounding: Vec<GroundingReference>,
}

impl ChatMessage {
    fn new(sender: Sender, text: String, status: MessageStatus) -> Self {
        Self {
            id: MessageId::new(),
            sender,
            text,
            timestamp: Utc::now(),
            status,
            is_error: false,
            grounding: Vec::new(),
        }
    }

    /// A user message
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Sender::User, text.into(), MessageStatus::Complete)
    }

    /// A system notice
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Sender::System, text.into(), MessageStatus::Complete)
    }

    /// A finished bot message (welcome text and the like)
    pub fn bot(text: impl Into<String>) -> Self {
        Self::new(Sender::Bot, text.into(), MessageStatus::Complete)
    }

    /// An empty bot message awaiting a streamed reply
    pub fn bot_placeholder() -> Self {
        Self::new(Sender::Bot, String::new(), MessageStatus::Pending)
    }
}
