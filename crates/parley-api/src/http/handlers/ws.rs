//! WebSocket handler: the duplex channel of the live session protocol.
//!
//! `GET /ws?sessionId=...` upgrades to a WebSocket. On upgrade the handler
//! resolves the session identity (adopting a non-empty hint, minting one
//! otherwise), registers the connection into the session's broadcast
//! group, and emits a `session` event with the resolved identity. From
//! then on it multiplexes three sources in one task:
//!
//! - broadcasts for the session group (user echoes, assistant answers),
//! - connection-scoped events (status transitions, error notices),
//! - inbound frames from the client (user turns).
//!
//! Inbound user turns are handed to the gateway, which runs each exchange
//! as a detached task -- closing the socket never cancels an in-flight
//! answer or store write. Lagged group receivers log a warning and keep
//! going.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{broadcast, mpsc};

use parley_core::gateway::{ConnectionSink, StatusMachine};
use parley_types::event::{ClientEvent, ServerEvent};

use crate::state::AppState;

/// Query parameters accepted on the upgrade request.
#[derive(Debug, Deserialize)]
pub struct WsParams {
    /// Previously issued session identity, if the client has one.
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

/// Upgrade an HTTP request to the session WebSocket.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state, params.session_id))
}

/// Core WebSocket connection loop.
///
/// `biased` ordering polls group broadcasts before connection-scoped
/// status events, preserving the per-exchange guarantee that a `message`
/// broadcast is written to the socket before the status transition that
/// follows it.
async fn handle_ws_connection(socket: WebSocket, state: AppState, hint: Option<String>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let (session_id, mut group_rx) = state.gateway.connect(hint.as_deref());

    // Tell the client its resolved identity before anything else.
    let session_event = ServerEvent::Session {
        session_id: session_id.clone(),
    };
    if send_event(&mut ws_sender, &session_event).await.is_err() {
        // The receiver must be gone before deregistering, or the group
        // entry survives the leave.
        drop(group_rx);
        state.gateway.disconnect(&session_id);
        return;
    }

    let (conn_tx, mut conn_rx) = mpsc::unbounded_channel();
    let sink = ConnectionSink::new(conn_tx);
    let status = StatusMachine::new();

    loop {
        tokio::select! {
            biased;

            // --- Branch 1: session group broadcasts ---
            group_result = group_rx.recv() => {
                match group_result {
                    Ok(event) => {
                        if send_event(&mut ws_sender, &event).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(
                            session_id = %session_id,
                            skipped = n,
                            "WebSocket subscriber lagged, skipping {n} events"
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }

            // --- Branch 2: connection-scoped status/error events ---
            Some(event) = conn_rx.recv() => {
                if send_event(&mut ws_sender, &event).await.is_err() {
                    break;
                }
            }

            // --- Branch 3: inbound frames from the client ---
            msg_result = ws_receiver.next() => {
                match msg_result {
                    Some(Ok(Message::Text(text))) => {
                        process_inbound(&state, &session_id, &text, &sink, &status);
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(err)) => {
                        tracing::debug!(session_id = %session_id, "WebSocket receive error: {err}");
                        break;
                    }
                    // Ignore binary, ping, pong protocol frames
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    drop(group_rx);
    state.gateway.disconnect(&session_id);
    tracing::debug!(session_id = %session_id, "WebSocket connection closed");
}

/// Parse one inbound frame and start an exchange for it.
///
/// Malformed frames are logged and ignored. The connection is tagged with
/// exactly one session identity for its whole lifetime, so a payload
/// carrying a different `sessionId` is logged and overridden.
fn process_inbound(
    state: &AppState,
    session_id: &str,
    text: &str,
    sink: &ConnectionSink,
    status: &StatusMachine,
) {
    let event: ClientEvent = match serde_json::from_str(text) {
        Ok(event) => event,
        Err(err) => {
            tracing::warn!(
                session_id = %session_id,
                raw = %text,
                error = %err,
                "Ignoring malformed WebSocket event"
            );
            return;
        }
    };

    let ClientEvent::Message(inbound) = event;
    if inbound.session_id != session_id {
        tracing::debug!(
            connection_session = %session_id,
            payload_session = %inbound.session_id,
            "inbound message tagged with foreign session id, using connection identity"
        );
    }

    // The exchange runs detached; nothing to await here.
    let _ = state
        .gateway
        .submit(session_id, &inbound.message, sink.clone(), status.clone());
}

async fn send_event(
    ws_sender: &mut (impl SinkExt<Message, Error = axum::Error> + Unpin),
    event: &ServerEvent,
) -> Result<(), ()> {
    match serde_json::to_string(event) {
        Ok(json) => ws_sender
            .send(Message::Text(json.into()))
            .await
            .map_err(|_| ()),
        Err(err) => {
            tracing::warn!("Failed to serialize ServerEvent: {err}");
            Ok(())
        }
    }
}
