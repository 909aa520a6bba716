//! Surface Events
//!
//! Events sent from a view to the Conductor. These represent the ways a
//! user can act on the chat.
//!
//! # Design Philosophy
//!
//! Views are "dumb" renderers that forward user actions to the Conductor.
//! They don't interpret what actions mean - they just report what happened.
//! The Conductor decides how to respond.

use serde::{Deserialize, Serialize};

use crate::modes::ModeId;

/// Events from a view to the Conductor
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SurfaceEvent {
    /// User submitted a message
    UserMessage {
        /// Message text
        content: String,
    },

    /// User picked a mode in the sidebar
    ModeSelected {
        /// The chosen mode
        mode: ModeId,
    },

    /// User clicked one of the current mode's suggested queries
    SuggestionSelected {
        /// Position in the mode's suggestion list
        index: usize,
    },
}
