//! Axum router configuration with middleware.
//!
//! All chat routes are under `/api/chat/` and require authentication;
//! `/health` is open. Middleware: CORS, tracing.

use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let chat_routes = Router::new()
        // Conversation CRUD
        .route(
            "/conversations",
            post(handlers::conversation::create_conversation)
                .get(handlers::conversation::list_conversations),
        )
        .route(
            "/conversations/search",
            get(handlers::conversation::search_conversations),
        )
        .route(
            "/conversations/{id}",
            get(handlers::conversation::get_conversation)
                .delete(handlers::conversation::delete_conversation),
        )
        .route(
            "/conversations/{id}/title",
            put(handlers::conversation::update_title),
        )
        // The exchange
        .route(
            "/conversations/{id}/messages",
            post(handlers::chat::send_message),
        )
        .route(
            "/conversations/{id}/context/reset",
            post(handlers::chat::reset_context),
        )
        // Engine introspection
        .route("/engine/status", get(handlers::status::engine_status));

    Router::new()
        .nest("/api/chat", chat_routes)
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - Simple health check endpoint (no auth required).
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
