//! Stream Demultiplexer
//!
//! Splits raw provider chunks into the two event kinds the conversation
//! cares about: text deltas and grounding references.

use crate::backend::{ProviderChunk, SourceKind};
use crate::messages::GroundingReference;

/// A typed event produced while streaming a reply
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SendEvent {
    /// Non-empty text to append to the reply
    TextDelta(String),
    /// Web references to append to the reply's citations
    Grounding(Vec<GroundingReference>),
}

/// What a single provider chunk contained
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DemuxedChunk {
    /// Nothing usable (no text and no web references)
    Empty,
    /// Only text
    TextDelta(String),
    /// Only web references
    Grounding(Vec<GroundingReference>),
    /// Both
    Mixed {
        /// Web references from the chunk's metadata
        grounding: Vec<GroundingReference>,
        /// Text fragment
        text: String,
    },
}

impl DemuxedChunk {
    /// Classify a provider chunk
    ///
    /// Empty text counts as no text. Only web sources become grounding
    /// references; metadata without any yields no grounding.
    pub fn classify(chunk: ProviderChunk) -> Self {
        let text = chunk.text.filter(|t| !t.is_empty());
        let grounding: Vec<GroundingReference> = chunk
            .grounding_metadata
            .map(|metadata| {
                metadata
                    .references
                    .into_iter()
                    .filter(|r| r.source_kind == SourceKind::Web)
                    .map(|r| GroundingReference::new(r.uri, r.title))
                    .collect()
            })
            .unwrap_or_default();

        match (text, grounding.is_empty()) {
            (None, true) => Self::Empty,
            (Some(text), true) => Self::TextDelta(text),
            (None, false) => Self::Grounding(grounding),
            (Some(text), false) => Self::Mixed { grounding, text },
        }
    }

    /// Events in emission order; grounding comes before text
    pub fn into_events(self) -> Vec<SendEvent> {
        match self {
            Self::Empty => Vec::new(),
            Self::TextDelta(text) => vec![SendEvent::TextDelta(text)],
            Self::Grounding(refs) => vec![SendEvent::Grounding(refs)],
            Self::Mixed { grounding, text } => {
                vec![SendEvent::Grounding(grounding), SendEvent::TextDelta(text)]
            }
        }
    }
}
