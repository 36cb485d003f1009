//! Broadcast group registry: session identity -> live connections.
//!
//! Each session with at least one live connection owns a
//! `tokio::sync::broadcast` channel; every connection tagged with that
//! identity holds a receiver. Publishing to a session with no live
//! connections is silently dropped -- results still reach the store, only
//! the broadcast has no recipient.
//!
//! Membership lifecycle is tied one-to-one to connect/disconnect: the
//! gateway calls [`SessionRegistry::join`] on connect and
//! [`SessionRegistry::leave`] on disconnect, and the group entry is removed
//! once its last receiver is gone.

use dashmap::DashMap;
use tokio::sync::broadcast;

use parley_types::event::ServerEvent;

/// Per-group channel capacity. Slow subscribers past this lag drop old
/// events rather than blocking publishers.
const GROUP_CAPACITY: usize = 256;

/// In-process registry of broadcast groups keyed by session identity.
pub struct SessionRegistry {
    groups: DashMap<String, broadcast::Sender<ServerEvent>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            groups: DashMap::new(),
        }
    }

    /// Register a connection into the group for `session_id`, creating the
    /// group if this is its first connection. Returns the receiver the
    /// connection reads broadcasts from.
    pub fn join(&self, session_id: &str) -> broadcast::Receiver<ServerEvent> {
        self.groups
            .entry(session_id.to_string())
            .or_insert_with(|| broadcast::channel(GROUP_CAPACITY).0)
            .subscribe()
    }

    /// Deregister a connection. Call after its receiver has been dropped;
    /// the group entry is removed when no receivers remain.
    pub fn leave(&self, session_id: &str) {
        self.groups
            .remove_if(session_id, |_, sender| sender.receiver_count() == 0);
    }

    /// The group sender for `session_id`, if any connection is present.
    ///
    /// Exchange tasks grab a sender up front so they can keep broadcasting
    /// (or harmlessly fail to) after the originating connection closes.
    pub fn sender(&self, session_id: &str) -> Option<broadcast::Sender<ServerEvent>> {
        self.groups.get(session_id).map(|e| e.clone())
    }

    /// Broadcast an event to every connection in the session's group.
    /// Dropped silently when the group is empty or absent.
    pub fn publish(&self, session_id: &str, event: ServerEvent) {
        if let Some(sender) = self.groups.get(session_id) {
            let _ = sender.send(event);
        }
    }

    /// Number of groups with at least one live connection.
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("groups", &self.groups.len())
            .finish()
    }
}
