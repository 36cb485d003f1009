//! The per-exchange protocol: one user turn in, one assistant turn out.
//!
//! [`Gateway`] owns the broadcast group registry and runs each inbound
//! message as a detached exchange task. Within one exchange the event
//! order observed by subscribers is fixed:
//!
//! 1. user `message` (broadcast to the session group)
//! 2. `status:typing` (originating connection only)
//! 3. `status:processing` -- only if the pipeline outlasts the escalation
//!    window, and at most once
//! 4. assistant `message` with `isComplete = true` (broadcast), or an
//!    `error` event on pipeline failure
//! 5. `status:idle`
//!
//! Store appends are fired without blocking the broadcast path but are
//! joined before the terminal `status:idle`, so a client that re-reads
//! history after seeing idle is guaranteed to find both turns. Across
//! overlapping exchanges on one session no ordering is promised; each
//! runs independently and their events may interleave.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use uuid::Uuid;

use parley_types::error::StoreError;
use parley_types::event::{ServerEvent, StatusUpdate};
use parley_types::message::Message;

use crate::pipeline::PipelineAdapter;
use crate::store::SessionStore;

use super::registry::SessionRegistry;
use super::status::{EscalationTimer, StatusMachine};

/// Status notice shown while the pipeline call is in flight.
pub const TYPING_NOTICE: &str = "Searching for information...";
/// Status notice shown once the escalation window elapses.
pub const PROCESSING_NOTICE: &str = "This might take a moment...";
/// Generic failure text surfaced to clients; backend details stay in logs.
pub const EXCHANGE_FAILED_NOTICE: &str = "Error processing your message";

/// Connection-scoped event sink (status and error events).
///
/// Wraps the unbounded channel drained by the connection's socket loop.
/// Sending after the connection has closed is silently dropped, which is
/// exactly the semantics a finished-but-orphaned exchange needs.
#[derive(Clone)]
pub struct ConnectionSink {
    tx: mpsc::UnboundedSender<ServerEvent>,
}

impl ConnectionSink {
    pub fn new(tx: mpsc::UnboundedSender<ServerEvent>) -> Self {
        Self { tx }
    }

    pub fn send(&self, event: ServerEvent) {
        let _ = self.tx.send(event);
    }
}

/// Session gateway: resolves identities, fans out broadcasts, and drives
/// the per-exchange protocol against the store and the pipeline adapter.
pub struct Gateway<S> {
    store: Arc<S>,
    pipeline: PipelineAdapter,
    registry: SessionRegistry,
    escalation: Duration,
}

impl<S: SessionStore + 'static> Gateway<S> {
    pub fn new(store: Arc<S>, pipeline: PipelineAdapter, escalation: Duration) -> Self {
        Self {
            store,
            pipeline,
            registry: SessionRegistry::new(),
            escalation,
        }
    }

    /// Resolve the session identity for a new connection and register it
    /// into the matching broadcast group.
    ///
    /// A non-empty hint is adopted verbatim (reconnects and multi-tab);
    /// otherwise a fresh opaque identifier is minted. The caller must emit
    /// the returned identity back to the client as a `session` event.
    pub fn connect(&self, session_hint: Option<&str>) -> (String, broadcast::Receiver<ServerEvent>) {
        let session_id = match session_hint.map(str::trim) {
            Some(hint) if !hint.is_empty() => hint.to_string(),
            _ => Uuid::now_v7().to_string(),
        };
        let receiver = self.registry.join(&session_id);
        tracing::debug!(session_id = %session_id, "connection joined session group");
        (session_id, receiver)
    }

    /// Deregister a closed connection. No store or identity side effects;
    /// in-flight exchanges keep running and persisting.
    pub fn disconnect(&self, session_id: &str) {
        self.registry.leave(session_id);
        tracing::debug!(session_id = %session_id, "connection left session group");
    }

    /// Run one exchange for an inbound user turn.
    ///
    /// Empty or whitespace-only content is a silent no-op (mirrors the
    /// client-side guard): no events, no store writes, no error. Otherwise
    /// the exchange is spawned as a detached task and the handle returned,
    /// mainly so tests can await completion.
    pub fn submit(
        &self,
        session_id: &str,
        content: &str,
        conn: ConnectionSink,
        status: StatusMachine,
    ) -> Option<JoinHandle<()>> {
        let content = content.trim();
        if content.is_empty() {
            tracing::debug!(session_id = %session_id, "ignoring empty message");
            return None;
        }

        // Grab the group sender now: the exchange keeps broadcasting even
        // after the originating connection closes. A session with no live
        // group still gets its writes; the broadcasts just have nowhere
        // to go.
        let group = self
            .registry
            .sender(session_id)
            .unwrap_or_else(|| broadcast::channel(1).0);

        Some(tokio::spawn(run_exchange(
            self.store.clone(),
            self.pipeline.clone(),
            group,
            conn,
            status,
            session_id.to_string(),
            content.to_string(),
            self.escalation,
        )))
    }
}

impl<S> std::fmt::Debug for Gateway<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("registry", &self.registry)
            .field("escalation", &self.escalation)
            .finish_non_exhaustive()
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_exchange<S: SessionStore + 'static>(
    store: Arc<S>,
    pipeline: PipelineAdapter,
    group: broadcast::Sender<ServerEvent>,
    conn: ConnectionSink,
    status: StatusMachine,
    session_id: String,
    content: String,
    escalation: Duration,
) {
    // Echo the user turn to the whole group immediately; delivery is not
    // gated on persistence.
    let user_msg = Message::user(content.clone());
    let _ = group.send(ServerEvent::Message(user_msg.clone()));
    let user_write = spawn_append(&store, &session_id, user_msg);

    status.set_typing();
    conn.send(ServerEvent::Status(StatusUpdate::typing(TYPING_NOTICE)));

    // Single deferred escalation; firing after the exchange has settled is
    // a no-op via the status machine.
    let timer = {
        let status = status.clone();
        let conn = conn.clone();
        EscalationTimer::spawn(escalation, move || {
            if status.escalate() {
                conn.send(ServerEvent::Status(StatusUpdate::processing(
                    PROCESSING_NOTICE,
                )));
            }
        })
    };

    let outcome = pipeline.answer(&content).await;
    timer.cancel();

    let assistant_write = match outcome {
        Ok(answer) => {
            let assistant_msg = Message::assistant(answer);
            let write = spawn_append(&store, &session_id, assistant_msg.clone());
            let _ = group.send(ServerEvent::Message(assistant_msg));
            Some(write)
        }
        Err(err) => {
            tracing::error!(session_id = %session_id, error = %err, "answer pipeline failed");
            conn.send(ServerEvent::Error {
                message: EXCHANGE_FAILED_NOTICE.to_string(),
            });
            None
        }
    };

    // The one hard synchronization point: both store writes must be
    // confirmed before the exchange reports idle, so read-after-idle sees
    // the full exchange.
    join_write(&session_id, user_write).await;
    if let Some(write) = assistant_write {
        join_write(&session_id, write).await;
    }

    status.reset();
    conn.send(ServerEvent::Status(StatusUpdate::idle()));
}

fn spawn_append<S: SessionStore + 'static>(
    store: &Arc<S>,
    session_id: &str,
    message: Message,
) -> JoinHandle<Result<(), StoreError>> {
    let store = store.clone();
    let session_id = session_id.to_string();
    tokio::spawn(async move { store.append(&session_id, &message).await })
}

async fn join_write(session_id: &str, handle: JoinHandle<Result<(), StoreError>>) {
    match handle.await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            tracing::error!(session_id = %session_id, error = %err, "store write failed")
        }
        Err(err) => {
            tracing::error!(session_id = %session_id, error = %err, "store write task panicked")
        }
    }
}
