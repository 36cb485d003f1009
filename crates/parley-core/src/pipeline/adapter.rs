//! Pipeline adapter with a degraded mode for the boot window.
//!
//! The answer pipeline initializes asynchronously after the server starts
//! accepting connections (and may never initialize at all when credentials
//! are missing). Until a pipeline is installed, the adapter answers every
//! query with [`FALLBACK_ANSWER`] -- a required degraded mode, not an
//! error path. Exchanges therefore never fail just because the backend is
//! still booting.

use std::sync::Arc;

use tokio::sync::RwLock;

use parley_types::error::PipelineError;

use super::BoxAnswerPipeline;

/// Fixed, user-legible answer served while no pipeline is installed.
pub const FALLBACK_ANSWER: &str =
    "I'm sorry, the knowledge base is currently unavailable. Please try again later.";

/// Swappable slot holding the current answer pipeline.
///
/// Cloning shares the slot: the boot task installs the pipeline through one
/// clone while the gateway answers through another.
#[derive(Clone)]
pub struct PipelineAdapter {
    slot: Arc<RwLock<Option<BoxAnswerPipeline>>>,
}

impl PipelineAdapter {
    /// Create an adapter with no pipeline installed (degraded mode).
    pub fn uninitialized() -> Self {
        Self {
            slot: Arc::new(RwLock::new(None)),
        }
    }

    /// Create an adapter with a pipeline already installed.
    pub fn with_pipeline(pipeline: BoxAnswerPipeline) -> Self {
        Self {
            slot: Arc::new(RwLock::new(Some(pipeline))),
        }
    }

    /// Install (or replace) the pipeline. Exchanges already awaiting a
    /// previous pipeline are unaffected.
    pub async fn install(&self, pipeline: BoxAnswerPipeline) {
        let name = pipeline.name().to_string();
        *self.slot.write().await = Some(pipeline);
        tracing::info!(pipeline = %name, "answer pipeline installed");
    }

    /// Whether a pipeline is currently installed.
    pub async fn is_ready(&self) -> bool {
        self.slot.read().await.is_some()
    }

    /// Answer a query, or serve the fallback when uninitialized.
    ///
    /// The slot lock is released before the backend call so a slow answer
    /// never blocks installation.
    pub async fn answer(&self, query: &str) -> Result<String, PipelineError> {
        let pipeline = self.slot.read().await.clone();
        match pipeline {
            Some(p) => p.answer(query).await,
            None => Ok(FALLBACK_ANSWER.to_string()),
        }
    }
}

impl std::fmt::Debug for PipelineAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineAdapter").finish_non_exhaustive()
    }
}
