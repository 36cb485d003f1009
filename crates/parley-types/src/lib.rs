//! Shared domain and wire types for Parley.
//!
//! This crate holds the plain data types exchanged between the gateway,
//! the session store, and clients: messages, duplex channel events,
//! configuration, and error enums. No I/O, no async.

pub mod config;
pub mod error;
pub mod event;
pub mod message;
