//! ConversationRepository trait definition.
//!
//! Persistence operations for conversations and messages. All reads and
//! mutations are scoped to the owning user; a conversation is invisible to
//! anyone else. Implementations live in moneta-infra
//! (e.g., `SqliteConversationRepository`).
//!
//! Uses native async fn in traits (RPITIT, Rust 2024 edition).

use moneta_types::conversation::{Conversation, Message};
use moneta_types::error::RepositoryError;
use uuid::Uuid;

/// Everything one chat exchange writes, persisted atomically.
///
/// `conversation` carries the already-mutated metadata (`updated_at`, a
/// possibly derived title). Either all three rows land or none do: no user
/// message is ever committed without its paired assistant outcome.
#[derive(Debug, Clone)]
pub struct ExchangeRecord {
    pub conversation: Conversation,
    pub user_message: Message,
    pub assistant_message: Message,
}

/// Repository trait for conversation and message persistence.
pub trait ConversationRepository: Send + Sync {
    /// Create a new conversation.
    fn create_conversation(
        &self,
        conversation: &Conversation,
    ) -> impl std::future::Future<Output = Result<Conversation, RepositoryError>> + Send;

    /// Get a conversation by id, scoped to its owner. `None` when missing
    /// or owned by someone else.
    fn get_conversation(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Conversation>, RepositoryError>> + Send;

    /// List a user's conversations, most recently updated first.
    fn list_conversations(
        &self,
        user_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<Conversation>, RepositoryError>> + Send;

    /// Delete a conversation and its messages. `NotFound` when missing or
    /// foreign-owned.
    fn delete_conversation(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Rename a conversation. `NotFound` when missing or foreign-owned.
    fn update_title(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
        title: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Search a user's conversations by title or message content
    /// (case-insensitive substring), most recently updated first.
    fn search_conversations(
        &self,
        user_id: &Uuid,
        query: &str,
    ) -> impl std::future::Future<Output = Result<Vec<Conversation>, RepositoryError>> + Send;

    /// All messages of a conversation, oldest first.
    fn list_messages(
        &self,
        conversation_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<Message>, RepositoryError>> + Send;

    /// The `limit` most recent messages of a conversation, newest first.
    fn recent_messages(
        &self,
        conversation_id: &Uuid,
        limit: i64,
    ) -> impl std::future::Future<Output = Result<Vec<Message>, RepositoryError>> + Send;

    /// Persist one exchange atomically: user message, assistant message,
    /// and the conversation's updated metadata in a single transaction.
    fn record_exchange(
        &self,
        record: &ExchangeRecord,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
