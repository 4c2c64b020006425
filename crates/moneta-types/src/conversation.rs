//! Conversation and message types for Moneta.
//!
//! A conversation belongs to exactly one user and is visible only to that
//! user. Messages are append-only and ordered by creation time within their
//! conversation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Default title assigned at creation, replaced by the first exchange.
pub const DEFAULT_TITLE: &str = "New Conversation";

/// Who authored a message.
///
/// Maps to the CHECK constraint in the SQLite schema:
/// `CHECK (role IN ('user', 'assistant'))`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

impl FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            other => Err(format!("invalid message role: '{other}'")),
        }
    }
}

/// A conversation between a user and the assistant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Whether the title is still the placeholder and should be derived
    /// from the first user message.
    pub fn has_placeholder_title(&self) -> bool {
        self.title.is_empty() || self.title == DEFAULT_TITLE
    }
}

/// A single message within a conversation.
///
/// Assistant messages may carry the engine's intent label, confidence score,
/// and extracted entities; user messages leave those unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub role: MessageRole,
    pub content: String,
    pub intent: Option<String>,
    pub confidence: Option<f64>,
    pub entities: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Build a user message with a fresh time-sortable id.
    pub fn user(conversation_id: Uuid, content: String) -> Self {
        Self {
            id: Uuid::now_v7(),
            conversation_id,
            role: MessageRole::User,
            content,
            intent: None,
            confidence: None,
            entities: None,
            created_at: Utc::now(),
        }
    }

    /// Build an assistant message with a fresh time-sortable id.
    pub fn assistant(
        conversation_id: Uuid,
        content: String,
        intent: Option<String>,
        confidence: Option<f64>,
        entities: Option<Vec<String>>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            conversation_id,
            role: MessageRole::Assistant,
            content,
            intent,
            confidence,
            entities,
            created_at: Utc::now(),
        }
    }
}
