//! Chat service orchestrating the message exchange lifecycle.
//!
//! `ChatService` coordinates the conversation repository and the engine
//! registry: it persists the user message, assembles bounded history,
//! invokes the engine, absorbs engine timeouts and initialization failures
//! into canned assistant replies, and commits the whole exchange as one
//! atomic unit. It also carries the thin conversation CRUD operations.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

use moneta_types::conversation::{Conversation, Message, DEFAULT_TITLE};
use moneta_types::engine::{EngineReply, EngineRequest, HistoryTurn};
use moneta_types::error::ChatError;
use moneta_types::payload::{clean, EngineValue};

use crate::chat::repository::{ConversationRepository, ExchangeRecord};
use crate::engine::contract::EngineLoader;
use crate::engine::registry::{AcquireError, EngineRegistry};
use crate::engine::SemanticEngine;

/// Sliding history window: the current message plus at most this many
/// minus one prior turns reach the engine.
const HISTORY_WINDOW: i64 = 10;

/// Derived titles are truncated to this many characters.
const TITLE_MAX_CHARS: usize = 50;

/// Acquisitions slower than this are logged as warnings.
const SLOW_ACQUIRE_WARN: Duration = Duration::from_secs(5);

/// Bound on a single engine processing call.
const PROCESS_TIMEOUT: Duration = Duration::from_secs(30);

/// Shown when the engine was not ready in time.
const TIMEOUT_APOLOGY: &str = "I'm experiencing high load right now and couldn't process \
     your request in time. Please try again in a moment.";

/// Shown when engine construction failed.
const INIT_APOLOGY: &str = "I'm having trouble initializing my AI models right now. \
     Please wait a moment and try again.";

/// The result of one user-message-in, assistant-message-out round trip.
#[derive(Debug, Clone, Serialize)]
pub struct ExchangeOutcome {
    pub user_message: Message,
    pub assistant_message: Message,
    pub data: Option<Value>,
    pub chart_type: Option<String>,
    /// Normalized auxiliary payload; `error` key set on degraded paths.
    pub understanding: Option<Value>,
}

/// Orchestrates chat exchanges and conversation CRUD.
///
/// Generic over the repository and engine loader so tests inject mocks
/// while the application pins the SQLite and finance-engine concretions.
pub struct ChatService<R: ConversationRepository, L: EngineLoader> {
    repo: R,
    registry: Arc<EngineRegistry<L>>,
    process_timeout: Duration,
}

/// How the engine invocation ended, before persistence.
enum EngineInvocation {
    Success(EngineReply),
    TimedOut,
    InitFailed(String),
}

impl<R: ConversationRepository, L: EngineLoader> ChatService<R, L> {
    pub fn new(repo: R, registry: Arc<EngineRegistry<L>>) -> Self {
        Self {
            repo,
            registry,
            process_timeout: PROCESS_TIMEOUT,
        }
    }

    /// Override the engine processing bound (tests use short ones).
    pub fn with_process_timeout(mut self, timeout: Duration) -> Self {
        self.process_timeout = timeout;
        self
    }

    /// Access the engine registry (status reporting, prewarm).
    pub fn registry(&self) -> &Arc<EngineRegistry<L>> {
        &self.registry
    }

    // --- The exchange ---

    /// Run one full message exchange within a conversation.
    ///
    /// Engine timeouts and initialization failures do not fail the
    /// exchange: a canned assistant apology is persisted instead and the
    /// degradation is flagged in the `understanding` payload. Exactly one
    /// user row and one assistant row are committed on every non-error
    /// return, atomically.
    pub async fn handle_message(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
        content: &str,
    ) -> Result<ExchangeOutcome, ChatError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ChatError::Validation(
                "message content cannot be empty".to_string(),
            ));
        }

        let mut conversation = self
            .repo
            .get_conversation(&conversation_id, &user_id)
            .await?
            .ok_or(ChatError::NotFound)?;

        let user_message = Message::user(conversation_id, content.to_string());
        let history = self.conversation_history(&conversation_id).await?;

        let invocation = self
            .invoke_engine(conversation_id, user_id, content, history)
            .await?;

        let (reply, assistant_message) = match invocation {
            EngineInvocation::Success(reply) => {
                let entities = extract_entities(reply.understanding.as_ref());
                let message = Message::assistant(
                    conversation_id,
                    reply.response.clone(),
                    reply.intent.clone(),
                    reply.confidence,
                    entities,
                );
                (reply, message)
            }
            EngineInvocation::TimedOut => {
                let message =
                    Message::assistant(conversation_id, TIMEOUT_APOLOGY.to_string(), None, None, None);
                (synthesized_reply(TIMEOUT_APOLOGY, "timeout"), message)
            }
            EngineInvocation::InitFailed(reason) => {
                let message =
                    Message::assistant(conversation_id, INIT_APOLOGY.to_string(), None, None, None);
                (synthesized_reply(INIT_APOLOGY, &reason), message)
            }
        };

        conversation.updated_at = Utc::now();
        if conversation.has_placeholder_title() {
            conversation.title = derive_title(content);
        }

        self.repo
            .record_exchange(&ExchangeRecord {
                conversation,
                user_message: user_message.clone(),
                assistant_message: assistant_message.clone(),
            })
            .await
            .map_err(|e| {
                error!(error = %e, %conversation_id, "failed to commit exchange");
                ChatError::Unexpected(e.to_string())
            })?;

        let understanding = reply.understanding.map(|u| Value::from(clean(u)));

        Ok(ExchangeOutcome {
            user_message,
            assistant_message,
            data: reply.data,
            chart_type: reply.chart_type,
            understanding,
        })
    }

    /// Acquire the engine and run it, folding the failure modes the
    /// exchange absorbs into [`EngineInvocation`].
    async fn invoke_engine(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
        content: &str,
        history: Vec<HistoryTurn>,
    ) -> Result<EngineInvocation, ChatError> {
        let acquire_started = Instant::now();
        let engine = match self.registry.acquire().await {
            Ok(engine) => engine,
            Err(AcquireError::Timeout) => {
                warn!(%conversation_id, "engine acquisition timed out");
                return Ok(EngineInvocation::TimedOut);
            }
            Err(AcquireError::Initialization(reason)) => {
                error!(%conversation_id, %reason, "engine initialization failed");
                return Ok(EngineInvocation::InitFailed(reason));
            }
        };

        let acquire_elapsed = acquire_started.elapsed();
        if acquire_elapsed > SLOW_ACQUIRE_WARN {
            warn!(
                elapsed_ms = acquire_elapsed.as_millis() as u64,
                "engine acquisition was slow"
            );
        }

        let request = EngineRequest {
            query: content.to_string(),
            conversation_id,
            user_id: Some(user_id),
            history,
        };

        let process_started = Instant::now();
        match tokio::time::timeout(self.process_timeout, engine.process(request)).await {
            Ok(Ok(reply)) => {
                info!(
                    elapsed_ms = process_started.elapsed().as_millis() as u64,
                    intent = reply.intent.as_deref().unwrap_or("none"),
                    "engine reply generated"
                );
                Ok(EngineInvocation::Success(reply))
            }
            Ok(Err(err)) => Err(ChatError::Unexpected(err.to_string())),
            Err(_) => {
                warn!(%conversation_id, "engine processing timed out");
                Ok(EngineInvocation::TimedOut)
            }
        }
    }

    /// The most recent prior turns, oldest first, projected to what the
    /// engine needs. The current (not yet persisted) message takes the
    /// window's last slot, so at most `HISTORY_WINDOW - 1` priors are kept.
    async fn conversation_history(
        &self,
        conversation_id: &Uuid,
    ) -> Result<Vec<HistoryTurn>, ChatError> {
        let mut recent = self
            .repo
            .recent_messages(conversation_id, HISTORY_WINDOW)
            .await?;
        recent.truncate(HISTORY_WINDOW as usize - 1);
        recent.reverse();
        Ok(recent
            .into_iter()
            .map(|m| HistoryTurn {
                role: m.role,
                content: m.content,
            })
            .collect())
    }

    // --- Conversation CRUD ---

    /// Create a conversation, defaulting the title to "New Conversation".
    pub async fn create_conversation(
        &self,
        user_id: Uuid,
        title: Option<String>,
    ) -> Result<Conversation, ChatError> {
        let now = Utc::now();
        let conversation = Conversation {
            id: Uuid::now_v7(),
            user_id,
            title: title
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            created_at: now,
            updated_at: now,
        };
        Ok(self.repo.create_conversation(&conversation).await?)
    }

    /// List the user's conversations, most recently updated first.
    pub async fn list_conversations(&self, user_id: Uuid) -> Result<Vec<Conversation>, ChatError> {
        Ok(self.repo.list_conversations(&user_id).await?)
    }

    /// A conversation with all its messages, oldest first.
    pub async fn conversation_detail(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> Result<(Conversation, Vec<Message>), ChatError> {
        let conversation = self
            .repo
            .get_conversation(&conversation_id, &user_id)
            .await?
            .ok_or(ChatError::NotFound)?;
        let messages = self.repo.list_messages(&conversation_id).await?;
        Ok((conversation, messages))
    }

    /// Delete a conversation and its messages.
    pub async fn delete_conversation(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), ChatError> {
        Ok(self
            .repo
            .delete_conversation(&conversation_id, &user_id)
            .await?)
    }

    /// Rename a conversation; the new title must be non-empty.
    pub async fn rename_conversation(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
        title: &str,
    ) -> Result<Conversation, ChatError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ChatError::Validation("title cannot be empty".to_string()));
        }
        self.repo
            .update_title(&conversation_id, &user_id, title)
            .await?;
        self.repo
            .get_conversation(&conversation_id, &user_id)
            .await?
            .ok_or(ChatError::NotFound)
    }

    /// Search conversations by title or message content. An empty query
    /// matches nothing.
    pub async fn search_conversations(
        &self,
        user_id: Uuid,
        query: &str,
    ) -> Result<Vec<Conversation>, ChatError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.repo.search_conversations(&user_id, query).await?)
    }

    /// Reset the engine's conversational context. Ownership is verified;
    /// an engine that was never constructed stays untouched.
    pub async fn reset_context(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), ChatError> {
        self.repo
            .get_conversation(&conversation_id, &user_id)
            .await?
            .ok_or(ChatError::NotFound)?;

        if let Some(engine) = self.registry.ready_engine() {
            engine.reset();
            info!(%conversation_id, "engine context reset");
        }
        Ok(())
    }
}

/// Degraded-path reply: apology text plus an `understanding.error` marker.
fn synthesized_reply(response: &str, error: &str) -> EngineReply {
    let mut understanding = EngineValue::map();
    understanding.insert("error".to_string(), EngineValue::Str(error.to_string()));
    EngineReply {
        response: response.to_string(),
        intent: Some("error".to_string()),
        confidence: None,
        data: None,
        chart_type: None,
        understanding: Some(EngineValue::Map(understanding)),
    }
}

/// Truncate the user's message into a title, appending an ellipsis marker
/// when anything was cut. Operates on characters, not bytes.
fn derive_title(content: &str) -> String {
    let mut title: String = content.chars().take(TITLE_MAX_CHARS).collect();
    if content.chars().count() > TITLE_MAX_CHARS {
        title.push_str("...");
    }
    title
}

/// Pull the entity list out of the understanding payload. Only a non-empty
/// collection yields `Some`.
fn extract_entities(understanding: Option<&EngineValue>) -> Option<Vec<String>> {
    let EngineValue::Map(entries) = understanding? else {
        return None;
    };
    let entities = match entries.get("entities")? {
        EngineValue::Set(items) => {
            let mut ordered: Vec<String> = items.iter().cloned().collect();
            ordered.sort();
            ordered
        }
        EngineValue::Seq(items) => items
            .iter()
            .filter_map(|v| match v {
                EngineValue::Str(s) => Some(s.clone()),
                _ => None,
            })
            .collect(),
        _ => return None,
    };
    if entities.is_empty() {
        None
    } else {
        Some(entities)
    }
}
