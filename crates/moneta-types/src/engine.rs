//! Semantic engine contract types.
//!
//! The engine accepts a fixed request shape: user identity and conversation
//! history are ordinary optional fields, agreed at compile time rather than
//! probed at call time.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::conversation::MessageRole;
use crate::payload::EngineValue;

/// One prior exchange turn, projected down to what the engine needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryTurn {
    pub role: MessageRole,
    pub content: String,
}

/// A processing request handed to the semantic engine.
#[derive(Debug, Clone)]
pub struct EngineRequest {
    /// The user's query, already trimmed and non-empty.
    pub query: String,
    /// Conversation the query belongs to; keys the engine's internal memory.
    pub conversation_id: Uuid,
    /// Identity of the requesting user, when the caller has one.
    pub user_id: Option<Uuid>,
    /// Bounded prior context, oldest first.
    pub history: Vec<HistoryTurn>,
}

/// A structured reply from the semantic engine.
///
/// `response` is the only mandatory field; everything else degrades to
/// `None` for engines that do not produce it.
#[derive(Debug, Clone)]
pub struct EngineReply {
    pub response: String,
    pub intent: Option<String>,
    pub confidence: Option<f64>,
    /// Chart-ready data rows, when the intent maps to a visualization.
    pub data: Option<Value>,
    pub chart_type: Option<String>,
    /// Auxiliary diagnostics (entities, matched terms); may contain sets
    /// that need normalization before transmission.
    pub understanding: Option<EngineValue>,
}

/// Snapshot of the engine slot for status reporting.
///
/// Produced without ever triggering construction.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub initialized: bool,
    pub loading: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_size: Option<usize>,
}

impl EngineStatus {
    /// Status for an engine that has not been constructed.
    pub fn uninitialized(loading: bool) -> Self {
        Self {
            initialized: false,
            loading,
            context: None,
            memory_size: None,
            cache_size: None,
        }
    }

    /// Status for a fully constructed engine.
    pub fn ready(context: Value, memory_size: usize, cache_size: usize) -> Self {
        Self {
            initialized: true,
            loading: false,
            context: Some(context),
            memory_size: Some(memory_size),
            cache_size: Some(cache_size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_uninitialized_status_serializes_without_sizes() {
        let status = EngineStatus::uninitialized(true);
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json, json!({"initialized": false, "loading": true}));
    }

    #[test]
    fn test_ready_status_serializes_sizes() {
        let status = EngineStatus::ready(json!({"active_conversations": 2}), 2, 17);
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["initialized"], json!(true));
        assert_eq!(json["memory_size"], json!(2));
        assert_eq!(json["cache_size"], json!(17));
    }

    #[test]
    fn test_history_turn_serde() {
        let turn = HistoryTurn {
            role: MessageRole::User,
            content: "how much did I spend on food?".to_string(),
        };
        let json = serde_json::to_string(&turn).unwrap();
        assert!(json.contains("\"role\":\"user\""));
    }
}
