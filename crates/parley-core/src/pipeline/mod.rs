//! Answer pipeline abstraction.
//!
//! [`AnswerPipeline`] is the contract for the external answer-generation
//! step: text in, answer text out or error. The gateway never calls a
//! pipeline directly; it goes through [`adapter::PipelineAdapter`], which
//! serves a fixed fallback answer while no pipeline is installed.

pub mod adapter;
pub mod boxed;

pub use adapter::{FALLBACK_ANSWER, PipelineAdapter};
pub use boxed::BoxAnswerPipeline;

use parley_types::error::PipelineError;

/// Trait for answer-generation backends.
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition). The
/// pipeline imposes no timeout of its own; the gateway's escalation timer
/// only changes the reported status, never aborts the call.
pub trait AnswerPipeline: Send + Sync {
    /// Human-readable backend name (e.g., "gemini").
    fn name(&self) -> &str;

    /// Produce an answer for the inbound text.
    fn answer(
        &self,
        query: &str,
    ) -> impl std::future::Future<Output = Result<String, PipelineError>> + Send;
}
