//! SQLite session store implementation.
//!
//! Implements `SessionStore` from `parley-core` using sqlx with split
//! read/write pools: raw queries, private Row structs, reader pool for
//! SELECTs, single-connection writer pool for appends (which is also what
//! serializes same-process appends in call order).
//!
//! Rolling expiry: every append refreshes the session's `expires_at` and
//! purges sessions already past their deadline (the delete cascades to
//! their messages, so an expired identity can never resurrect old history
//! on its next write). Read paths additionally filter by `expires_at`, so
//! unpurged expired rows are never visible.

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::Row;
use uuid::Uuid;

use parley_core::store::SessionStore;
use parley_types::error::StoreError;
use parley_types::message::{Message, MessageRole, SessionSummary};

use super::pool::DatabasePool;

/// SQLite-backed implementation of `SessionStore`.
pub struct SqliteSessionStore {
    pool: DatabasePool,
    retention: Duration,
}

impl SqliteSessionStore {
    /// Create a store with the given retention window (rolling expiry,
    /// refreshed on every write).
    pub fn new(pool: DatabasePool, retention: Duration) -> Self {
        Self { pool, retention }
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct MessageRow {
    role: String,
    content: String,
    created_at: String,
    is_complete: i64,
}

impl MessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            role: row.try_get("role")?,
            content: row.try_get("content")?,
            created_at: row.try_get("created_at")?,
            is_complete: row.try_get("is_complete")?,
        })
    }

    fn into_message(self) -> Result<Message, StoreError> {
        let role: MessageRole = self
            .role
            .parse()
            .map_err(|e: String| StoreError::Query(e))?;
        let timestamp = parse_datetime(&self.created_at)?;

        Ok(Message {
            role,
            content: self.content,
            timestamp,
            is_complete: self.is_complete != 0,
        })
    }
}

struct SummaryRow {
    session_id: String,
    content: String,
    created_at: String,
}

impl SummaryRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            session_id: row.try_get("session_id")?,
            content: row.try_get("content")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_summary(self) -> Result<SessionSummary, StoreError> {
        let last_timestamp = parse_datetime(&self.created_at)?;
        Ok(SessionSummary {
            session_id: self.session_id,
            last_message: self.content,
            last_timestamp,
        })
    }
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Query(format!("invalid datetime: {e}")))
}

// Fixed-width RFC 3339 so stored strings compare lexicographically.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn map_sqlx(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::PoolClosed | sqlx::Error::Io(_) => StoreError::Connection,
        e => StoreError::Query(e.to_string()),
    }
}

// ---------------------------------------------------------------------------
// SessionStore implementation
// ---------------------------------------------------------------------------

impl SessionStore for SqliteSessionStore {
    async fn append(&self, session_id: &str, message: &Message) -> Result<(), StoreError> {
        let now = Utc::now();
        let expires_at = now + self.retention;

        let mut tx = self.pool.writer.begin().await.map_err(map_sqlx)?;

        // Purge sessions already past their deadline; cascades to messages.
        sqlx::query("DELETE FROM sessions WHERE expires_at <= ?1")
            .bind(format_datetime(&now))
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;

        sqlx::query(
            "INSERT INTO sessions (session_id, expires_at) VALUES (?1, ?2)
             ON CONFLICT(session_id) DO UPDATE SET expires_at = excluded.expires_at",
        )
        .bind(session_id)
        .bind(format_datetime(&expires_at))
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?;

        sqlx::query(
            "INSERT INTO messages (id, session_id, role, content, created_at, is_complete)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(Uuid::now_v7().to_string())
        .bind(session_id)
        .bind(message.role.to_string())
        .bind(&message.content)
        .bind(format_datetime(&message.timestamp))
        .bind(message.is_complete as i64)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?;

        tx.commit().await.map_err(map_sqlx)
    }

    async fn read_all(&self, session_id: &str) -> Result<Vec<Message>, StoreError> {
        let rows = sqlx::query(
            "SELECT m.role, m.content, m.created_at, m.is_complete
             FROM messages m
             JOIN sessions s ON s.session_id = m.session_id
             WHERE m.session_id = ?1 AND s.expires_at > ?2
             ORDER BY m.seq ASC",
        )
        .bind(session_id)
        .bind(format_datetime(&Utc::now()))
        .fetch_all(&self.pool.reader)
        .await
        .map_err(map_sqlx)?;

        rows.iter()
            .map(|row| MessageRow::from_row(row).map_err(map_sqlx)?.into_message())
            .collect()
    }

    async fn clear(&self, session_id: &str) -> Result<(), StoreError> {
        // Deleting the session row cascades to its messages. Idempotent:
        // deleting an unknown session affects zero rows.
        sqlx::query("DELETE FROM sessions WHERE session_id = ?1")
            .bind(session_id)
            .execute(&self.pool.writer)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    async fn list_sessions(&self) -> Result<Vec<SessionSummary>, StoreError> {
        let rows = sqlx::query(
            "SELECT m.session_id, m.content, m.created_at
             FROM messages m
             JOIN sessions s ON s.session_id = m.session_id
             WHERE s.expires_at > ?1
               AND m.seq = (SELECT MAX(seq) FROM messages WHERE session_id = m.session_id)",
        )
        .bind(format_datetime(&Utc::now()))
        .fetch_all(&self.pool.reader)
        .await
        .map_err(map_sqlx)?;

        // A session vanishing between scan steps simply yields no row;
        // the listing never fails on an expiry race.
        rows.iter()
            .map(|row| SummaryRow::from_row(row).map_err(map_sqlx)?.into_summary())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn temp_store(retention: Duration) -> (SqliteSessionStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display());
        let pool = DatabasePool::new(&url).await.unwrap();
        (SqliteSessionStore::new(pool, retention), dir)
    }

    const HOUR: Duration = Duration::from_secs(3_600);

    #[tokio::test]
    async fn append_then_read_preserves_order() {
        let (store, _dir) = temp_store(HOUR).await;

        // Identical timestamps: append order must still win.
        let now = Utc::now();
        for content in ["first", "second", "third"] {
            let msg = Message {
                role: MessageRole::User,
                content: content.into(),
                timestamp: now,
                is_complete: true,
            };
            store.append("s-1", &msg).await.unwrap();
        }

        let history = store.read_all("s-1").await.unwrap();
        let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["first", "second", "third"]);
    }

    #[tokio::test]
    async fn unknown_session_reads_empty() {
        let (store, _dir) = temp_store(HOUR).await;
        assert!(store.read_all("never-seen").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn roundtrip_preserves_message_fields() {
        let (store, _dir) = temp_store(HOUR).await;
        let msg = Message::assistant("an answer");
        store.append("s-1", &msg).await.unwrap();

        let history = store.read_all("s-1").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, MessageRole::Assistant);
        assert_eq!(history[0].content, "an answer");
        assert!(history[0].is_complete);
        // Microsecond storage precision.
        assert_eq!(
            history[0].timestamp.timestamp_micros(),
            msg.timestamp.timestamp_micros()
        );
    }

    #[tokio::test]
    async fn clear_is_idempotent() {
        let (store, _dir) = temp_store(HOUR).await;
        store.append("s-1", &Message::user("hi")).await.unwrap();

        store.clear("s-1").await.unwrap();
        assert!(store.read_all("s-1").await.unwrap().is_empty());

        // Clearing again (and clearing the unknown) both succeed.
        store.clear("s-1").await.unwrap();
        store.clear("never-seen").await.unwrap();
    }

    #[tokio::test]
    async fn list_sessions_reports_most_recent_message() {
        let (store, _dir) = temp_store(HOUR).await;
        store.append("s-1", &Message::user("older")).await.unwrap();
        store
            .append("s-1", &Message::assistant("newest"))
            .await
            .unwrap();
        store.append("s-2", &Message::user("solo")).await.unwrap();

        let mut sessions = store.list_sessions().await.unwrap();
        sessions.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].session_id, "s-1");
        assert_eq!(sessions[0].last_message, "newest");
        assert_eq!(sessions[1].session_id, "s-2");
        assert_eq!(sessions[1].last_message, "solo");
    }

    #[tokio::test]
    async fn list_sessions_omits_cleared_sessions() {
        let (store, _dir) = temp_store(HOUR).await;
        store.append("s-1", &Message::user("keep")).await.unwrap();
        store.append("s-2", &Message::user("drop")).await.unwrap();
        store.clear("s-2").await.unwrap();

        let sessions = store.list_sessions().await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].session_id, "s-1");
    }

    #[tokio::test]
    async fn expired_session_reads_empty_and_is_unlisted() {
        let (store, _dir) = temp_store(Duration::ZERO).await;
        store.append("s-expired", &Message::user("gone")).await.unwrap();

        assert!(store.read_all("s-expired").await.unwrap().is_empty());
        assert!(store.list_sessions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn new_write_does_not_resurrect_expired_history() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display());
        let pool = DatabasePool::new(&url).await.unwrap();

        let ephemeral = SqliteSessionStore::new(pool.clone(), Duration::ZERO);
        ephemeral.append("s-1", &Message::user("stale")).await.unwrap();

        let durable = SqliteSessionStore::new(pool, HOUR);
        durable.append("s-1", &Message::user("fresh")).await.unwrap();

        let history = durable.read_all("s-1").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, "fresh");
    }

    #[tokio::test]
    async fn concurrent_appends_to_different_sessions() {
        let (store, _dir) = temp_store(HOUR).await;
        let store = std::sync::Arc::new(store);

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let sid = format!("s-{i}");
                for n in 0..5 {
                    store
                        .append(&sid, &Message::user(format!("m-{n}")))
                        .await
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        for i in 0..8 {
            let history = store.read_all(&format!("s-{i}")).await.unwrap();
            let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
            assert_eq!(contents, ["m-0", "m-1", "m-2", "m-3", "m-4"]);
        }
    }
}
