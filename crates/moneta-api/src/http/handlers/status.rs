//! Engine status HTTP handler.
//!
//! GET /api/chat/engine/status - Report the engine slot state without ever
//! triggering construction.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use moneta_types::engine::EngineStatus;

use crate::http::error::AppError;
use crate::http::extractors::auth::AuthUser;
use crate::http::response::Envelope;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct StatusPayload {
    pub status: EngineStatus,
}

/// GET /api/chat/engine/status - Current engine initialization state.
pub async fn engine_status(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Result<Json<Envelope<StatusPayload>>, AppError> {
    let status = state.engine_registry.status();
    Ok(Json(Envelope::new(StatusPayload { status })))
}
