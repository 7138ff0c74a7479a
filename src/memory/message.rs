//! Conversation message types shared by every storage tier.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// End-user message
    User,
    /// Assistant response
    Assistant,
    /// System message (instructions)
    System,
}

impl MessageRole {
    /// Returns the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }

    /// Parse a role stored by a durable tier. Unknown roles yield `None`
    /// and the record is skipped, not an error.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

/// A single message within a conversation.
///
/// Messages are totally ordered by `timestamp`; every tier preserves that
/// order, so a list read back from any tier is chronological.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Who sent the message
    pub role: MessageRole,
    /// Message content
    pub content: String,
    /// When the message was produced
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a user message stamped now.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::stamped(MessageRole::User, content)
    }

    /// Create an assistant message stamped now.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::stamped(MessageRole::Assistant, content)
    }

    /// Create a system message stamped now.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::stamped(MessageRole::System, content)
    }

    /// Create a message with an explicit timestamp (durable-tier rehydration).
    #[must_use]
    pub fn with_timestamp(
        role: MessageRole,
        content: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp,
        }
    }

    fn stamped(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Opaque per-conversation pipeline state.
///
/// Owned by the calling pipeline; the memory subsystem only caches it,
/// TTL-bound, with no durable fallback.
pub type StateSnapshot = HashMap<String, serde_json::Value>;

/// Cache-derived statistics for one conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    /// The conversation this summary describes
    pub conversation_id: String,
    /// Number of messages currently cached
    pub message_count: usize,
    /// True if the cache holds any history
    pub has_history: bool,
}

/// Generate a fresh conversation identifier.
#[must_use]
pub fn generate_conversation_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_strings() {
        for role in [MessageRole::User, MessageRole::Assistant, MessageRole::System] {
            assert_eq!(MessageRole::parse(role.as_str()), Some(role));
        }
        assert_eq!(MessageRole::parse("tool"), None);
    }

    #[test]
    fn constructors_stamp_current_time() {
        let before = Utc::now();
        let message = Message::user("hi");
        assert_eq!(message.role, MessageRole::User);
        assert_eq!(message.content, "hi");
        assert!(message.timestamp >= before);
    }

    #[test]
    fn serde_uses_lowercase_roles() {
        let json = serde_json::to_string(&Message::assistant("hello")).unwrap();
        assert!(json.contains(r#""role":"assistant""#));

        let parsed: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.role, MessageRole::Assistant);
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(generate_conversation_id(), generate_conversation_id());
    }
}
