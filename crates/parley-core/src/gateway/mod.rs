//! Session gateway: the live session protocol.
//!
//! One WebSocket connection maps to one [`registry::SessionRegistry`]
//! membership plus one [`status::StatusMachine`]. Inbound user turns run
//! as detached exchange tasks (see [`exchange`]) so a disconnect never
//! cancels an in-flight answer or store write.

pub mod exchange;
pub mod registry;
pub mod status;

pub use exchange::{ConnectionSink, Gateway};
pub use registry::SessionRegistry;
pub use status::{Status, StatusMachine};
