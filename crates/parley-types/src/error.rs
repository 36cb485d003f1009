use thiserror::Error;

/// Errors from the session store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),
}

/// Errors from the answer pipeline backend.
///
/// An *uninitialized* pipeline is not an error: the adapter serves the
/// fixed fallback answer instead. These variants cover a pipeline that
/// exists but fails.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("backend error: {0}")]
    Backend(String),

    #[error("backend returned an empty completion")]
    EmptyCompletion,
}
