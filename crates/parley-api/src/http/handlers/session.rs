//! Session directory handler.
//!
//! `GET /session` - list known sessions for the history sidebar.

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use parley_types::message::SessionSummary;

use crate::http::error::AppError;
use crate::state::AppState;

/// Response body for `GET /session`.
#[derive(Debug, Serialize)]
pub struct SessionList {
    pub sessions: Vec<SessionSummary>,
}

/// GET /session - one entry per known session, unordered.
pub async fn list_sessions(
    State(state): State<AppState>,
) -> Result<Json<SessionList>, AppError> {
    let sessions = state.directory.list().await?;
    Ok(Json(SessionList { sessions }))
}
