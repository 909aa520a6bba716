//! Conversation State Store
//!
//! The ordered message list a view renders. The list is append-only; the
//! newest bot reply is mutated in place while its stream is running.
//!
//! Every mutation publishes a [`ConductorMessage`] to all subscribers before
//! returning, so a view observes changes on its next render tick without
//! polling the store.

use tokio::sync::mpsc;

use crate::error::StoreError;
use crate::messages::{
    ChatMessage, ConductorMessage, GroundingReference, MessageId, MessageStatus, Sender,
    STREAM_ERROR_TEXT,
};

/// Ordered, in-memory conversation with change notification
#[derive(Debug, Default)]
pub struct ConversationStore {
    messages: Vec<ChatMessage>,
    subscribers: Vec<mpsc::UnboundedSender<ConductorMessage>>,
}

impl ConversationStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a view; it receives every notification published from now on
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<ConductorMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    /// Deliver a notification to every subscriber, dropping closed ones
    pub(crate) fn publish(&mut self, message: ConductorMessage) {
        self.subscribers
            .retain(|subscriber| subscriber.send(message.clone()).is_ok());
    }

    /// Append a user message
    pub fn append_user(&mut self, text: impl Into<String>) -> MessageId {
        self.push(ChatMessage::user(text))
    }

    /// Append a system notice
    pub fn append_system(&mut self, text: impl Into<String>) -> MessageId {
        self.push(ChatMessage::system(text))
    }

    /// Append a finished bot message
    pub fn append_bot(&mut self, text: impl Into<String>) -> MessageId {
        self.push(ChatMessage::bot(text))
    }

    /// Append an empty `Pending` bot message for a reply about to stream
    pub fn append_bot_placeholder(&mut self) -> MessageId {
        self.push(ChatMessage::bot_placeholder())
    }

    fn push(&mut self, message: ChatMessage) -> MessageId {
        let id = message.id.clone();
        self.messages.push(message.clone());
        self.publish(ConductorMessage::MessageAppended { message });
        id
    }

    /// Append a text fragment to a streaming bot message
    pub fn apply_text_delta(&mut self, id: &MessageId, delta: &str) -> Result<(), StoreError> {
        let msg = self.streamable(id)?;
        if delta.is_empty() {
            return Ok(());
        }
        msg.text.push_str(delta);
        msg.status = MessageStatus::Streaming;
        self.publish(ConductorMessage::TextDelta {
            message_id: id.clone(),
            text: delta.to_string(),
        });
        Ok(())
    }

    /// Append grounding references to a streaming bot message
    ///
    /// References are appended as given; duplicates are kept.
    pub fn apply_grounding(
        &mut self,
        id: &MessageId,
        references: Vec<GroundingReference>,
    ) -> Result<(), StoreError> {
        let msg = self.streamable(id)?;
        if references.is_empty() {
            return Ok(());
        }
        msg.grounding.extend(references.iter().cloned());
        msg.status = MessageStatus::Streaming;
        self.publish(ConductorMessage::Grounding {
            message_id: id.clone(),
            references,
        });
        Ok(())
    }

    /// Finish a bot message successfully
    pub fn mark_complete(&mut self, id: &MessageId) -> Result<(), StoreError> {
        let msg = self.streamable(id)?;
        msg.status = MessageStatus::Complete;
        self.publish(ConductorMessage::StreamEnd {
            message_id: id.clone(),
        });
        Ok(())
    }

    /// Finish a bot message with an error
    ///
    /// The partial text is replaced by [`STREAM_ERROR_TEXT`]; grounding
    /// references received so far are kept.
    pub fn mark_error(&mut self, id: &MessageId) -> Result<(), StoreError> {
        let msg = self.streamable(id)?;
        msg.text = STREAM_ERROR_TEXT.to_string();
        msg.is_error = true;
        msg.status = MessageStatus::Errored;
        self.publish(ConductorMessage::StreamError {
            message_id: id.clone(),
        });
        Ok(())
    }

    /// Resolve a message that may still receive stream updates
    fn streamable(&mut self, id: &MessageId) -> Result<&mut ChatMessage, StoreError> {
        let msg = self
            .messages
            .iter_mut()
            .rev()
            .find(|m| &m.id == id)
            .ok_or_else(|| StoreError::UnknownMessage(id.clone()))?;

        if msg.sender != Sender::Bot {
            return Err(StoreError::NotBotMessage(id.clone()));
        }
        if msg.status.is_terminal() {
            return Err(StoreError::Finalized {
                id: id.clone(),
                status: msg.status,
            });
        }
        Ok(msg)
    }

    /// Get message by ID
    pub fn get(&self, id: &MessageId) -> Option<&ChatMessage> {
        self.messages.iter().find(|m| &m.id == id)
    }

    /// All messages in chat order
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// The most recent message
    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    /// Number of messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the conversation is empty
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
