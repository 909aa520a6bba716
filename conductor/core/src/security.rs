//! Input Validation
//!
//! User text is checked here before it reaches the conversation or the
//! provider:
//! - Oversized messages
//! - Control character injection
//!
//! Emptiness is checked by the Conductor itself, since it maps to its own
//! error variant.

use serde::{Deserialize, Serialize};

/// Configuration limits for the Conductor
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConductorLimits {
    /// Maximum size of a single message in bytes (default: 100KB)
    pub max_message_size: usize,
}

impl Default for ConductorLimits {
    fn default() -> Self {
        Self {
            max_message_size: 100 * 1024, // 100KB
        }
    }
}

/// Result of input validation
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValidationResult {
    /// Input is valid
    Valid,
    /// Input is invalid with reason
    Invalid(String),
}

impl ValidationResult {
    /// Get the error message if invalid
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Valid => None,
            Self::Invalid(msg) => Some(msg),
        }
    }
}

/// Input validator for submitted user messages
#[derive(Clone, Debug, Default)]
pub struct InputValidator {
    limits: ConductorLimits,
}

impl InputValidator {
    /// Create a new input validator with the given limits
    pub fn new(limits: ConductorLimits) -> Self {
        Self { limits }
    }

    /// Validate a user message
    pub fn validate_message(&self, content: &str) -> ValidationResult {
        if content.len() > self.limits.max_message_size {
            return ValidationResult::Invalid(format!(
                "Message too large: {} bytes (max: {})",
                content.len(),
                self.limits.max_message_size
            ));
        }

        // Newline, tab and CR are fine in pasted text
        if content
            .chars()
            .any(|c| c.is_control() && c != '\n' && c != '\t' && c != '\r')
        {
            return ValidationResult::Invalid(
                "Message contains invalid control characters".to_string(),
            );
        }

        ValidationResult::Valid
    }
}
