//! SessionStore trait definition.
//!
//! An append-only, time-bounded log of messages keyed by session identity.
//! Implementations live in `parley-infra` (e.g., `SqliteSessionStore`).
//! Uses native async fn in traits (RPITIT, Rust 2024 edition).

use parley_types::error::StoreError;
use parley_types::message::{Message, SessionSummary};

/// Repository trait for the per-session message log.
///
/// Implementations must support concurrent appends to different sessions
/// without interference, and must preserve in-process call order for
/// appends to the same session.
pub trait SessionStore: Send + Sync {
    /// Durable ordered insert. Refreshes the session's expiry window as a
    /// side effect.
    fn append(
        &self,
        session_id: &str,
        message: &Message,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// All messages for a session in chronological order. Unknown or
    /// expired sessions yield an empty sequence, not an error.
    fn read_all(
        &self,
        session_id: &str,
    ) -> impl std::future::Future<Output = Result<Vec<Message>, StoreError>> + Send;

    /// Remove all messages for a session. Idempotent; succeeds even if the
    /// session was already empty or unknown.
    fn clear(
        &self,
        session_id: &str,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// One entry per known session, derived from its most recent message.
    /// Sessions whose data disappears mid-scan (expiry race) are omitted
    /// rather than failing the listing. Result order is unspecified.
    fn list_sessions(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<SessionSummary>, StoreError>> + Send;
}
