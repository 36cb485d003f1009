//! Duplex channel events exchanged over the WebSocket.
//!
//! Frames are JSON text, adjacently tagged: `{"event": ..., "data": ...}`.
//! Clients send [`ClientEvent`]; the server sends [`ServerEvent`]. Unknown
//! or malformed frames are logged and ignored by the gateway.

use serde::{Deserialize, Serialize};

use std::fmt;

use crate::message::Message;

/// Incoming event from a WebSocket client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum ClientEvent {
    /// Submit a user turn for the connection's session.
    Message(ClientMessage),
}

/// Payload of a client `message` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientMessage {
    pub message: String,
    pub session_id: String,
}

/// Outgoing event from the server.
///
/// `session` and `status` are connection-scoped; `message` events are
/// broadcast to every connection in the session's group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum ServerEvent {
    /// Resolved/assigned session identity, sent once on connect.
    #[serde(rename_all = "camelCase")]
    Session { session_id: String },
    /// A stored turn: user echo or completed assistant answer.
    Message(Message),
    /// Exchange progress on the originating connection.
    Status(StatusUpdate),
    /// Exchange-level failure notice.
    Error { message: String },
}

/// Processing phase of a connection's current exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    Idle,
    Typing,
    Processing,
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusKind::Idle => write!(f, "idle"),
            StatusKind::Typing => write!(f, "typing"),
            StatusKind::Processing => write!(f, "processing"),
        }
    }
}

/// Payload of a server `status` event: `{type, message?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdate {
    #[serde(rename = "type")]
    pub kind: StatusKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StatusUpdate {
    pub fn idle() -> Self {
        Self {
            kind: StatusKind::Idle,
            message: None,
        }
    }

    pub fn typing(notice: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Typing,
            message: Some(notice.into()),
        }
    }

    pub fn processing(notice: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Processing,
            message: Some(notice.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_parses() {
        let json = r#"{"event":"message","data":{"message":"hi","sessionId":"s-1"}}"#;
        let ev: ClientEvent = serde_json::from_str(json).unwrap();
        let ClientEvent::Message(msg) = ev;
        assert_eq!(msg.message, "hi");
        assert_eq!(msg.session_id, "s-1");
    }

    #[test]
    fn test_malformed_client_event_rejected() {
        let json = r#"{"event":"shout","data":{}}"#;
        assert!(serde_json::from_str::<ClientEvent>(json).is_err());
    }

    #[test]
    fn test_session_event_wire_shape() {
        let ev = ServerEvent::Session {
            session_id: "s-1".into(),
        };
        let json = serde_json::to_string(&ev).unwrap();
        assert_eq!(json, r#"{"event":"session","data":{"sessionId":"s-1"}}"#);
    }

    #[test]
    fn test_status_event_wire_shape() {
        let ev = ServerEvent::Status(StatusUpdate::typing("Searching for information..."));
        let json = serde_json::to_string(&ev).unwrap();
        assert!(json.starts_with(r#"{"event":"status""#));
        assert!(json.contains(r#""type":"typing""#));
        assert!(json.contains("Searching for information..."));
    }

    #[test]
    fn test_idle_status_omits_message() {
        let json = serde_json::to_string(&StatusUpdate::idle()).unwrap();
        assert_eq!(json, r#"{"type":"idle"}"#);
    }

    #[test]
    fn test_message_event_carries_full_turn() {
        let ev = ServerEvent::Message(Message::user("hello"));
        let json = serde_json::to_string(&ev).unwrap();
        assert!(json.starts_with(r#"{"event":"message""#));
        assert!(json.contains(r#""role":"user""#));
    }

    #[test]
    fn test_error_event_wire_shape() {
        let ev = ServerEvent::Error {
            message: "Error processing your message".into(),
        };
        let json = serde_json::to_string(&ev).unwrap();
        assert_eq!(
            json,
            r#"{"event":"error","data":{"message":"Error processing your message"}}"#
        );
    }
}
