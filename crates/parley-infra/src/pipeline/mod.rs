//! Answer pipeline backends.

pub mod gemini;

pub use gemini::GeminiPipeline;
