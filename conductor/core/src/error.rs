//! Error types for the conductor core

use thiserror::Error;

use crate::messages::{MessageId, MessageStatus};

/// Errors from the Session Controller
#[derive(Debug, Error)]
pub enum ConductorError {
    /// `send` was called before any session was started
    #[error("chat session not initialized")]
    NotInitialized,

    /// Empty or whitespace-only input
    #[error("message is empty")]
    EmptyInput,

    /// A request is already streaming
    #[error("a response is still being generated")]
    RequestInFlight,

    /// Input failed validation
    #[error("invalid message: {0}")]
    InvalidInput(String),

    /// The backend could not create a session
    #[error("failed to create session: {0:#}")]
    SessionCreation(anyhow::Error),

    /// A conversation store operation failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors from Conversation State Store mutations
///
/// A failed mutation leaves the store unchanged.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// No message has this ID
    #[error("unknown message {0}")]
    UnknownMessage(MessageId),

    /// Only bot messages receive stream updates
    #[error("message {0} is not a bot message")]
    NotBotMessage(MessageId),

    /// The message already reached a terminal state
    #[error("message {id} is already finalized ({status:?})")]
    Finalized {
        /// The message
        id: MessageId,
        /// Its terminal status
        status: MessageStatus,
    },
}

/// A provider failure that ended a response stream
///
/// The reason is for logs only; users see the fixed error text.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("provider stream failed: {reason}")]
pub struct StreamFailure {
    reason: String,
}

impl StreamFailure {
    /// Create a failure with the provider's reason
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// The provider's reason
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}
