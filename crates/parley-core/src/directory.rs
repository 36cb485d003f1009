//! Session directory: read-model over the store for the history sidebar.
//!
//! No independent state; every listing is derived fresh from the store's
//! most-recent message per session. Sessions that expire mid-scan are
//! omitted by the store, not surfaced as errors.

use std::sync::Arc;

use parley_types::error::StoreError;
use parley_types::message::SessionSummary;

use crate::store::SessionStore;

/// Thin read-model exposing the list of known sessions.
pub struct SessionDirectory<S> {
    store: Arc<S>,
}

impl<S: SessionStore> SessionDirectory<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// One entry per session with at least one live message. Order is
    /// unspecified.
    pub async fn list(&self) -> Result<Vec<SessionSummary>, StoreError> {
        self.store.list_sessions().await
    }
}

impl<S> std::fmt::Debug for SessionDirectory<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionDirectory").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MemoryStore;
    use parley_types::message::Message;

    #[tokio::test]
    async fn listing_reflects_most_recent_message() {
        let store = Arc::new(MemoryStore::new());
        store.append("s-1", &Message::user("older")).await.unwrap();
        store
            .append("s-1", &Message::assistant("newest"))
            .await
            .unwrap();
        store.append("s-2", &Message::user("only")).await.unwrap();

        let directory = SessionDirectory::new(store);
        let mut sessions = directory.list().await.unwrap();
        sessions.sort_by(|a, b| a.session_id.cmp(&b.session_id));

        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].session_id, "s-1");
        assert_eq!(sessions[0].last_message, "newest");
        assert_eq!(sessions[1].last_message, "only");
    }

    #[tokio::test]
    async fn cleared_sessions_are_omitted() {
        let store = Arc::new(MemoryStore::new());
        store.append("s-1", &Message::user("gone soon")).await.unwrap();
        store.clear("s-1").await.unwrap();

        let directory = SessionDirectory::new(store);
        assert!(directory.list().await.unwrap().is_empty());
    }
}
