//! In-memory fakes shared across unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use parley_types::error::{PipelineError, StoreError};
use parley_types::message::{Message, SessionSummary};

use crate::pipeline::AnswerPipeline;
use crate::store::SessionStore;

/// HashMap-backed session store. Appends fail on demand to exercise the
/// store-unavailability path.
pub struct MemoryStore {
    sessions: Mutex<HashMap<String, Vec<Message>>>,
    fail_appends: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            fail_appends: AtomicBool::new(false),
        }
    }

    pub fn fail_appends(&self) {
        self.fail_appends.store(true, Ordering::SeqCst);
    }

    pub fn message_count(&self, session_id: &str) -> usize {
        self.sessions
            .lock()
            .unwrap()
            .get(session_id)
            .map_or(0, Vec::len)
    }
}

impl SessionStore for MemoryStore {
    async fn append(&self, session_id: &str, message: &Message) -> Result<(), StoreError> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(StoreError::Connection);
        }
        self.sessions
            .lock()
            .unwrap()
            .entry(session_id.to_string())
            .or_default()
            .push(message.clone());
        Ok(())
    }

    async fn read_all(&self, session_id: &str) -> Result<Vec<Message>, StoreError> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn clear(&self, session_id: &str) -> Result<(), StoreError> {
        self.sessions.lock().unwrap().remove(session_id);
        Ok(())
    }

    async fn list_sessions(&self) -> Result<Vec<SessionSummary>, StoreError> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(id, messages)| {
                messages.last().map(|last| SessionSummary {
                    session_id: id.clone(),
                    last_message: last.content.clone(),
                    last_timestamp: last.timestamp,
                })
            })
            .collect())
    }
}

/// Pipeline returning a canned answer, optionally after a delay.
pub struct StubPipeline {
    answer: String,
    delay: Duration,
}

impl StubPipeline {
    pub fn answering(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn answering_after(answer: &str, delay: Duration) -> Self {
        Self {
            answer: answer.to_string(),
            delay,
        }
    }
}

impl AnswerPipeline for StubPipeline {
    fn name(&self) -> &str {
        "stub"
    }

    async fn answer(&self, _query: &str) -> Result<String, PipelineError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.answer.clone())
    }
}

/// Pipeline that always fails.
pub struct FailingPipeline;

impl AnswerPipeline for FailingPipeline {
    fn name(&self) -> &str {
        "failing"
    }

    async fn answer(&self, _query: &str) -> Result<String, PipelineError> {
        Err(PipelineError::Backend("synthetic failure".into()))
    }
}

/// Pipeline echoing the query back, for distinguishing concurrent exchanges.
pub struct EchoPipeline;

impl AnswerPipeline for EchoPipeline {
    fn name(&self) -> &str {
        "echo"
    }

    async fn answer(&self, query: &str) -> Result<String, PipelineError> {
        Ok(format!("echo: {query}"))
    }
}
