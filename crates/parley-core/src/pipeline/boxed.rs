//! BoxAnswerPipeline -- object-safe dynamic dispatch wrapper for AnswerPipeline.
//!
//! The adapter swaps pipelines in at runtime, which requires a trait
//! object. `AnswerPipeline` uses RPITIT and is not object-safe, so:
//!
//! 1. Define an object-safe `AnswerPipelineDyn` trait with boxed futures
//! 2. Blanket-impl `AnswerPipelineDyn` for all `T: AnswerPipeline`
//! 3. `BoxAnswerPipeline` wraps `Arc<dyn AnswerPipelineDyn>` and delegates

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parley_types::error::PipelineError;

use super::AnswerPipeline;

/// Object-safe version of [`AnswerPipeline`] with boxed futures.
pub trait AnswerPipelineDyn: Send + Sync {
    fn name(&self) -> &str;

    fn answer_boxed<'a>(
        &'a self,
        query: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, PipelineError>> + Send + 'a>>;
}

/// Blanket implementation: any `AnswerPipeline` automatically implements
/// `AnswerPipelineDyn`.
impl<T: AnswerPipeline> AnswerPipelineDyn for T {
    fn name(&self) -> &str {
        AnswerPipeline::name(self)
    }

    fn answer_boxed<'a>(
        &'a self,
        query: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, PipelineError>> + Send + 'a>> {
        Box::pin(self.answer(query))
    }
}

/// Type-erased answer pipeline.
///
/// Cheap to clone (shared `Arc`); the adapter clones it out of its slot
/// before awaiting so the slot lock is never held across a backend call.
#[derive(Clone)]
pub struct BoxAnswerPipeline {
    inner: Arc<dyn AnswerPipelineDyn>,
}

impl BoxAnswerPipeline {
    /// Wrap a concrete `AnswerPipeline` in a type-erased handle.
    pub fn new<T: AnswerPipeline + 'static>(pipeline: T) -> Self {
        Self {
            inner: Arc::new(pipeline),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub async fn answer(&self, query: &str) -> Result<String, PipelineError> {
        self.inner.answer_boxed(query).await
    }
}

impl std::fmt::Debug for BoxAnswerPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxAnswerPipeline")
            .field("name", &self.inner.name())
            .finish()
    }
}
