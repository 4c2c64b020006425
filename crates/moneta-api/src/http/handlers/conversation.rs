//! Conversation CRUD HTTP handlers.
//!
//! Endpoints:
//! - POST   /api/chat/conversations            - Create a conversation
//! - GET    /api/chat/conversations            - List conversations
//! - GET    /api/chat/conversations/{id}       - Get one with its messages
//! - DELETE /api/chat/conversations/{id}       - Delete a conversation
//! - PUT    /api/chat/conversations/{id}/title - Rename a conversation
//! - GET    /api/chat/conversations/search?q=  - Search by title/content

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use moneta_types::conversation::{Conversation, Message};

use crate::http::error::AppError;
use crate::http::extractors::auth::AuthUser;
use crate::http::response::Envelope;
use crate::state::AppState;

/// Parse a UUID from a path parameter, returning a 400 error on invalid format.
pub fn parse_uuid(s: &str) -> Result<Uuid, AppError> {
    s.parse::<Uuid>()
        .map_err(|_| AppError::Validation(format!("Invalid conversation id: {s}")))
}

#[derive(Debug, Deserialize)]
pub struct CreateConversationRequest {
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RenameConversationRequest {
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Serialize)]
pub struct ConversationPayload {
    pub conversation: Conversation,
}

#[derive(Debug, Serialize)]
pub struct ConversationListPayload {
    pub conversations: Vec<Conversation>,
}

#[derive(Debug, Serialize)]
pub struct ConversationDetailPayload {
    pub conversation: Conversation,
    pub messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
pub struct MessagePayload {
    pub message: &'static str,
}

/// POST /api/chat/conversations - Create a new conversation.
pub async fn create_conversation(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateConversationRequest>,
) -> Result<Json<Envelope<ConversationPayload>>, AppError> {
    let conversation = state
        .chat_service
        .create_conversation(auth.user_id, body.title)
        .await?;

    Ok(Json(Envelope::new(ConversationPayload { conversation })))
}

/// GET /api/chat/conversations - List the user's conversations.
pub async fn list_conversations(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Envelope<ConversationListPayload>>, AppError> {
    let conversations = state.chat_service.list_conversations(auth.user_id).await?;

    Ok(Json(Envelope::new(ConversationListPayload { conversations })))
}

/// GET /api/chat/conversations/{id} - Get a conversation with all messages.
pub async fn get_conversation(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(conversation_id): Path<String>,
) -> Result<Json<Envelope<ConversationDetailPayload>>, AppError> {
    let conversation_id = parse_uuid(&conversation_id)?;
    let (conversation, messages) = state
        .chat_service
        .conversation_detail(conversation_id, auth.user_id)
        .await?;

    Ok(Json(Envelope::new(ConversationDetailPayload {
        conversation,
        messages,
    })))
}

/// DELETE /api/chat/conversations/{id} - Delete a conversation.
pub async fn delete_conversation(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(conversation_id): Path<String>,
) -> Result<Json<Envelope<MessagePayload>>, AppError> {
    let conversation_id = parse_uuid(&conversation_id)?;
    state
        .chat_service
        .delete_conversation(conversation_id, auth.user_id)
        .await?;

    Ok(Json(Envelope::new(MessagePayload {
        message: "Conversation deleted",
    })))
}

/// PUT /api/chat/conversations/{id}/title - Rename a conversation.
pub async fn update_title(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(conversation_id): Path<String>,
    Json(body): Json<RenameConversationRequest>,
) -> Result<Json<Envelope<ConversationPayload>>, AppError> {
    let conversation_id = parse_uuid(&conversation_id)?;
    let conversation = state
        .chat_service
        .rename_conversation(conversation_id, auth.user_id, &body.title)
        .await?;

    Ok(Json(Envelope::new(ConversationPayload { conversation })))
}

/// GET /api/chat/conversations/search?q= - Search conversations.
pub async fn search_conversations(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Envelope<ConversationListPayload>>, AppError> {
    let conversations = state
        .chat_service
        .search_conversations(auth.user_id, &query.q)
        .await?;

    Ok(Json(Envelope::new(ConversationListPayload { conversations })))
}
