//! Domain logic for Parley, free of infrastructure dependencies.
//!
//! - [`store`] - the `SessionStore` repository trait the gateway writes
//!   through; implementations live in `parley-infra`.
//! - [`pipeline`] - the `AnswerPipeline` trait plus the adapter that
//!   degrades to a fixed fallback answer while the pipeline is booting.
//! - [`gateway`] - the per-connection exchange protocol: broadcast group
//!   registry, status machine, and the exchange task itself.
//! - [`directory`] - read-model listing known sessions from the store.

pub mod directory;
pub mod gateway;
pub mod pipeline;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;
