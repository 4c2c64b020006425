//! SQLite conversation repository implementation.
//!
//! Implements `ConversationRepository` from `moneta-core` using sqlx with
//! split read/write pools. Raw queries, private Row structs, rfc3339
//! datetimes as TEXT. The exchange write path runs in a single transaction
//! on the writer pool.

use moneta_core::chat::repository::{ConversationRepository, ExchangeRecord};
use moneta_types::conversation::{Conversation, Message, MessageRole};
use moneta_types::error::RepositoryError;
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `ConversationRepository`.
pub struct SqliteConversationRepository {
    pool: DatabasePool,
}

impl SqliteConversationRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct ConversationRow {
    id: String,
    user_id: String,
    title: String,
    created_at: String,
    updated_at: String,
}

impl ConversationRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            title: row.try_get("title")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_conversation(self) -> Result<Conversation, RepositoryError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| RepositoryError::Query(format!("invalid conversation id: {e}")))?;
        let user_id = Uuid::parse_str(&self.user_id)
            .map_err(|e| RepositoryError::Query(format!("invalid user_id: {e}")))?;

        Ok(Conversation {
            id,
            user_id,
            title: self.title,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

struct MessageRow {
    id: String,
    conversation_id: String,
    role: String,
    content: String,
    intent: Option<String>,
    confidence: Option<f64>,
    entities: Option<String>,
    created_at: String,
}

impl MessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            conversation_id: row.try_get("conversation_id")?,
            role: row.try_get("role")?,
            content: row.try_get("content")?,
            intent: row.try_get("intent")?,
            confidence: row.try_get("confidence")?,
            entities: row.try_get("entities")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_message(self) -> Result<Message, RepositoryError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| RepositoryError::Query(format!("invalid message id: {e}")))?;
        let conversation_id = Uuid::parse_str(&self.conversation_id)
            .map_err(|e| RepositoryError::Query(format!("invalid conversation_id: {e}")))?;
        let role: MessageRole = self
            .role
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;
        let entities = self
            .entities
            .as_deref()
            .map(serde_json::from_str::<Vec<String>>)
            .transpose()
            .map_err(|e| RepositoryError::Query(format!("invalid entities payload: {e}")))?;

        Ok(Message {
            id,
            conversation_id,
            role,
            content: self.content,
            intent: self.intent,
            confidence: self.confidence,
            entities,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn encode_entities(entities: Option<&Vec<String>>) -> Result<Option<String>, RepositoryError> {
    entities
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| RepositoryError::Query(format!("failed to encode entities: {e}")))
}

fn rows_to_conversations(
    rows: &[sqlx::sqlite::SqliteRow],
) -> Result<Vec<Conversation>, RepositoryError> {
    let mut conversations = Vec::with_capacity(rows.len());
    for row in rows {
        let conv_row =
            ConversationRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
        conversations.push(conv_row.into_conversation()?);
    }
    Ok(conversations)
}

fn rows_to_messages(rows: &[sqlx::sqlite::SqliteRow]) -> Result<Vec<Message>, RepositoryError> {
    let mut messages = Vec::with_capacity(rows.len());
    for row in rows {
        let msg_row =
            MessageRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
        messages.push(msg_row.into_message()?);
    }
    Ok(messages)
}

// ---------------------------------------------------------------------------
// ConversationRepository implementation
// ---------------------------------------------------------------------------

impl ConversationRepository for SqliteConversationRepository {
    async fn create_conversation(
        &self,
        conversation: &Conversation,
    ) -> Result<Conversation, RepositoryError> {
        sqlx::query(
            r#"INSERT INTO conversations (id, user_id, title, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?)"#,
        )
        .bind(conversation.id.to_string())
        .bind(conversation.user_id.to_string())
        .bind(&conversation.title)
        .bind(format_datetime(&conversation.created_at))
        .bind(format_datetime(&conversation.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(conversation.clone())
    }

    async fn get_conversation(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM conversations WHERE id = ? AND user_id = ?")
            .bind(conversation_id.to_string())
            .bind(user_id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let conv_row = ConversationRow::from_row(&row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(conv_row.into_conversation()?))
            }
            None => Ok(None),
        }
    }

    async fn list_conversations(
        &self,
        user_id: &Uuid,
    ) -> Result<Vec<Conversation>, RepositoryError> {
        let rows =
            sqlx::query("SELECT * FROM conversations WHERE user_id = ? ORDER BY updated_at DESC")
                .bind(user_id.to_string())
                .fetch_all(&self.pool.reader)
                .await
                .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows_to_conversations(&rows)
    }

    async fn delete_conversation(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM conversations WHERE id = ? AND user_id = ?")
            .bind(conversation_id.to_string())
            .bind(user_id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn update_title(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
        title: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE conversations SET title = ?, updated_at = ? WHERE id = ? AND user_id = ?",
        )
        .bind(title)
        .bind(format_datetime(&Utc::now()))
        .bind(conversation_id.to_string())
        .bind(user_id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn search_conversations(
        &self,
        user_id: &Uuid,
        query: &str,
    ) -> Result<Vec<Conversation>, RepositoryError> {
        let needle = format!("%{}%", query.to_lowercase());
        let rows = sqlx::query(
            r#"SELECT DISTINCT c.*
               FROM conversations c
               LEFT JOIN messages m ON m.conversation_id = c.id
               WHERE c.user_id = ?
                 AND (lower(c.title) LIKE ? OR lower(m.content) LIKE ?)
               ORDER BY c.updated_at DESC"#,
        )
        .bind(user_id.to_string())
        .bind(&needle)
        .bind(&needle)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows_to_conversations(&rows)
    }

    async fn list_messages(
        &self,
        conversation_id: &Uuid,
    ) -> Result<Vec<Message>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM messages WHERE conversation_id = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(conversation_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows_to_messages(&rows)
    }

    async fn recent_messages(
        &self,
        conversation_id: &Uuid,
        limit: i64,
    ) -> Result<Vec<Message>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT * FROM messages WHERE conversation_id = ?
               ORDER BY created_at DESC, id DESC LIMIT ?"#,
        )
        .bind(conversation_id.to_string())
        .bind(limit)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows_to_messages(&rows)
    }

    async fn record_exchange(&self, record: &ExchangeRecord) -> Result<(), RepositoryError> {
        let mut tx = self
            .pool
            .writer
            .begin()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        // Conversation metadata first; zero rows means it vanished (or the
        // owner changed) between the ownership check and the commit.
        let result = sqlx::query(
            "UPDATE conversations SET title = ?, updated_at = ? WHERE id = ? AND user_id = ?",
        )
        .bind(&record.conversation.title)
        .bind(format_datetime(&record.conversation.updated_at))
        .bind(record.conversation.id.to_string())
        .bind(record.conversation.user_id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        for message in [&record.user_message, &record.assistant_message] {
            sqlx::query(
                r#"INSERT INTO messages (id, conversation_id, role, content, intent, confidence, entities, created_at)
                   VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
            )
            .bind(message.id.to_string())
            .bind(message.conversation_id.to_string())
            .bind(message.role.to_string())
            .bind(&message.content)
            .bind(&message.intent)
            .bind(message.confidence)
            .bind(encode_entities(message.entities.as_ref())?)
            .bind(format_datetime(&message.created_at))
            .execute(&mut *tx)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::pool::DatabasePool;

    async fn test_pool() -> DatabasePool {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        // Leak tempdir so it lives for the test
        std::mem::forget(dir);
        DatabasePool::new(&url).await.unwrap()
    }

    async fn seed_user(pool: &DatabasePool) -> Uuid {
        let user_id = Uuid::now_v7();
        sqlx::query("INSERT INTO users (id, username, created_at) VALUES (?, ?, ?)")
            .bind(user_id.to_string())
            .bind(format!("user-{user_id}"))
            .bind(Utc::now().to_rfc3339())
            .execute(&pool.writer)
            .await
            .unwrap();
        user_id
    }

    fn make_conversation(user_id: Uuid, title: &str) -> Conversation {
        let now = Utc::now();
        Conversation {
            id: Uuid::now_v7(),
            user_id,
            title: title.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    fn make_exchange(conversation: &Conversation, query: &str, answer: &str) -> ExchangeRecord {
        let user_message = Message::user(conversation.id, query.to_string());
        let assistant_message = Message::assistant(
            conversation.id,
            answer.to_string(),
            Some("spending_summary".to_string()),
            Some(0.9),
            Some(vec!["food".to_string(), "rent".to_string()]),
        );
        let mut conversation = conversation.clone();
        conversation.updated_at = Utc::now();
        ExchangeRecord {
            conversation,
            user_message,
            assistant_message,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_conversation_scoped_to_owner() {
        let pool = test_pool().await;
        let repo = SqliteConversationRepository::new(pool.clone());
        let user_id = seed_user(&pool).await;
        let other_user = seed_user(&pool).await;

        let conversation = make_conversation(user_id, "Spending");
        repo.create_conversation(&conversation).await.unwrap();

        let found = repo
            .get_conversation(&conversation.id, &user_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, conversation.id);
        assert_eq!(found.title, "Spending");

        // Invisible to another user.
        let foreign = repo
            .get_conversation(&conversation.id, &other_user)
            .await
            .unwrap();
        assert!(foreign.is_none());
    }

    #[tokio::test]
    async fn test_list_conversations_most_recent_first() {
        let pool = test_pool().await;
        let repo = SqliteConversationRepository::new(pool.clone());
        let user_id = seed_user(&pool).await;

        let mut old = make_conversation(user_id, "Old");
        old.updated_at = Utc::now() - chrono::Duration::hours(2);
        repo.create_conversation(&old).await.unwrap();

        let fresh = make_conversation(user_id, "Fresh");
        repo.create_conversation(&fresh).await.unwrap();

        let list = repo.list_conversations(&user_id).await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].title, "Fresh");
        assert_eq!(list[1].title, "Old");
    }

    #[tokio::test]
    async fn test_delete_conversation_cascades_messages() {
        let pool = test_pool().await;
        let repo = SqliteConversationRepository::new(pool.clone());
        let user_id = seed_user(&pool).await;

        let conversation = make_conversation(user_id, "Doomed");
        repo.create_conversation(&conversation).await.unwrap();
        repo.record_exchange(&make_exchange(&conversation, "hello", "hi"))
            .await
            .unwrap();

        repo.delete_conversation(&conversation.id, &user_id)
            .await
            .unwrap();

        assert!(repo
            .get_conversation(&conversation.id, &user_id)
            .await
            .unwrap()
            .is_none());
        assert!(repo.list_messages(&conversation.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_foreign_conversation_is_not_found() {
        let pool = test_pool().await;
        let repo = SqliteConversationRepository::new(pool.clone());
        let user_id = seed_user(&pool).await;
        let other_user = seed_user(&pool).await;

        let conversation = make_conversation(user_id, "Mine");
        repo.create_conversation(&conversation).await.unwrap();

        let err = repo
            .delete_conversation(&conversation.id, &other_user)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_update_title() {
        let pool = test_pool().await;
        let repo = SqliteConversationRepository::new(pool.clone());
        let user_id = seed_user(&pool).await;

        let conversation = make_conversation(user_id, "Before");
        repo.create_conversation(&conversation).await.unwrap();

        repo.update_title(&conversation.id, &user_id, "After")
            .await
            .unwrap();

        let found = repo
            .get_conversation(&conversation.id, &user_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.title, "After");

        let err = repo
            .update_title(&Uuid::now_v7(), &user_id, "Nope")
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_search_matches_title_and_message_content() {
        let pool = test_pool().await;
        let repo = SqliteConversationRepository::new(pool.clone());
        let user_id = seed_user(&pool).await;

        let by_title = make_conversation(user_id, "Grocery budget");
        repo.create_conversation(&by_title).await.unwrap();

        let by_content = make_conversation(user_id, "Untitled");
        repo.create_conversation(&by_content).await.unwrap();
        repo.record_exchange(&make_exchange(
            &by_content,
            "how much did groceries cost?",
            "quite a lot",
        ))
        .await
        .unwrap();

        let unrelated = make_conversation(user_id, "Vacation");
        repo.create_conversation(&unrelated).await.unwrap();

        let hits = repo.search_conversations(&user_id, "GROCER").await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|c| c.id != unrelated.id));
    }

    #[tokio::test]
    async fn test_recent_messages_newest_first_with_limit() {
        let pool = test_pool().await;
        let repo = SqliteConversationRepository::new(pool.clone());
        let user_id = seed_user(&pool).await;

        let conversation = make_conversation(user_id, "Long");
        repo.create_conversation(&conversation).await.unwrap();
        for i in 0..4 {
            repo.record_exchange(&make_exchange(
                &conversation,
                &format!("question {i}"),
                &format!("answer {i}"),
            ))
            .await
            .unwrap();
        }

        let recent = repo.recent_messages(&conversation.id, 3).await.unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].content, "answer 3");
        assert_eq!(recent[1].content, "question 3");
        assert_eq!(recent[2].content, "answer 2");

        let all = repo.list_messages(&conversation.id).await.unwrap();
        assert_eq!(all.len(), 8);
        assert_eq!(all[0].content, "question 0");
    }

    #[tokio::test]
    async fn test_record_exchange_round_trips_metadata() {
        let pool = test_pool().await;
        let repo = SqliteConversationRepository::new(pool.clone());
        let user_id = seed_user(&pool).await;

        let conversation = make_conversation(user_id, "Spending");
        repo.create_conversation(&conversation).await.unwrap();
        repo.record_exchange(&make_exchange(&conversation, "rent and food?", "mostly rent"))
            .await
            .unwrap();

        let messages = repo.list_messages(&conversation.id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::User);
        assert!(messages[0].intent.is_none());
        assert_eq!(messages[1].role, MessageRole::Assistant);
        assert_eq!(messages[1].intent.as_deref(), Some("spending_summary"));
        assert_eq!(messages[1].confidence, Some(0.9));
        assert_eq!(
            messages[1].entities,
            Some(vec!["food".to_string(), "rent".to_string()])
        );
    }

    #[tokio::test]
    async fn test_record_exchange_on_missing_conversation_writes_nothing() {
        let pool = test_pool().await;
        let repo = SqliteConversationRepository::new(pool.clone());
        let user_id = seed_user(&pool).await;

        // Never persisted.
        let ghost = make_conversation(user_id, "Ghost");
        let record = make_exchange(&ghost, "anyone there?", "no");

        let err = repo.record_exchange(&record).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));

        // The transaction rolled back: no orphan messages.
        assert!(repo.list_messages(&ghost.id).await.unwrap().is_empty());
    }
}
