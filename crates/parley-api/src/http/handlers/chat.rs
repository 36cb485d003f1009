//! Chat history handlers.
//!
//! - `GET    /chat/{sessionId}` - full history read
//! - `DELETE /chat/{sessionId}` - clear history, idempotent

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Serialize;

use parley_core::store::SessionStore;
use parley_types::message::Message;

use crate::http::error::AppError;
use crate::state::AppState;

/// Response body for `GET /chat/{sessionId}`.
#[derive(Debug, Serialize)]
pub struct ChatHistory {
    pub messages: Vec<Message>,
}

/// GET /chat/{sessionId} - full history in chronological order.
///
/// Unknown or expired sessions yield an empty array, not a 404; only a
/// store failure is an error.
pub async fn get_history(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ChatHistory>, AppError> {
    let messages = state.store.read_all(&session_id).await?;
    Ok(Json(ChatHistory { messages }))
}

/// DELETE /chat/{sessionId} - remove all history for a session.
pub async fn delete_history(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.store.clear(&session_id).await?;
    tracing::info!(session_id = %session_id, "chat history cleared");
    Ok(StatusCode::NO_CONTENT)
}
