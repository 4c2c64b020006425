//! Message exchange HTTP handlers.
//!
//! Endpoints:
//! - POST /api/chat/conversations/{id}/messages      - Send a message
//! - POST /api/chat/conversations/{id}/context/reset - Reset engine context
//!
//! The send handler delegates to `ChatService::handle_message`, which
//! absorbs engine timeouts and initialization failures into canned
//! assistant replies — those paths still return 200 with the exchange.

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use tracing::info;

use moneta_core::chat::service::ExchangeOutcome;

use crate::http::error::AppError;
use crate::http::extractors::auth::AuthUser;
use crate::http::handlers::conversation::{parse_uuid, MessagePayload};
use crate::http::response::Envelope;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub content: String,
}

/// POST /api/chat/conversations/{id}/messages - Run one chat exchange.
pub async fn send_message(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(conversation_id): Path<String>,
    Json(body): Json<SendMessageRequest>,
) -> Result<Json<Envelope<ExchangeOutcome>>, AppError> {
    let conversation_id = parse_uuid(&conversation_id)?;

    info!(
        user_id = %auth.user_id,
        %conversation_id,
        preview = %body.content.chars().take(100).collect::<String>(),
        "message received"
    );

    let outcome = state
        .chat_service
        .handle_message(conversation_id, auth.user_id, &body.content)
        .await?;

    Ok(Json(Envelope::new(outcome)))
}

/// POST /api/chat/conversations/{id}/context/reset - Reset engine context.
pub async fn reset_context(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(conversation_id): Path<String>,
) -> Result<Json<Envelope<MessagePayload>>, AppError> {
    let conversation_id = parse_uuid(&conversation_id)?;
    state
        .chat_service
        .reset_context(conversation_id, auth.user_id)
        .await?;

    Ok(Json(Envelope::new(MessagePayload {
        message: "Context reset successfully",
    })))
}
