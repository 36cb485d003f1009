//! Infrastructure implementations for Parley.
//!
//! - [`sqlite`] - the SQLite-backed session store with rolling expiry.
//! - [`config`] - configuration loading (`config.toml` + `PARLEY_*` env).
//! - [`pipeline`] - the Gemini answer-pipeline backend.

pub mod config;
pub mod pipeline;
pub mod sqlite;
