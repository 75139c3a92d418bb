//! Wire frames for the chat channel.
//!
//! Frames are JSON objects tagged with `type`.

use crate::api::models::messages::MessageResponse;
use crate::types::{CaseId, UserId};
use serde::{Deserialize, Serialize};

/// Frames a client may send.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Subscribe to a case room (requires participation)
    JoinCase { case_id: CaseId },
    /// Persist and broadcast a message
    SendMessage { case_id: CaseId, body: String },
    /// Ephemeral typing indicator
    Typing { case_id: CaseId },
    /// Mark the counterpart's messages read
    MarkRead { case_id: CaseId },
}

/// Frames the server sends.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Acknowledges a successful join
    Joined { case_id: CaseId },
    /// A new message in a joined room
    Message { message: MessageResponse },
    /// Someone is typing in a joined room
    Typing { case_id: CaseId, user_id: UserId },
    /// Messages in the room were read by a participant
    Read { case_id: CaseId, reader_id: UserId },
    /// Something went wrong with the last frame
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_client_frames_decode() {
        let case_id = Uuid::new_v4();

        let join: ClientEvent =
            serde_json::from_str(&format!(r#"{{"type":"join_case","case_id":"{case_id}"}}"#)).unwrap();
        assert!(matches!(join, ClientEvent::JoinCase { case_id: c } if c == case_id));

        let send: ClientEvent =
            serde_json::from_str(&format!(r#"{{"type":"send_message","case_id":"{case_id}","body":"hi"}}"#)).unwrap();
        assert!(matches!(send, ClientEvent::SendMessage { body, .. } if body == "hi"));

        let typing: ClientEvent =
            serde_json::from_str(&format!(r#"{{"type":"typing","case_id":"{case_id}"}}"#)).unwrap();
        assert!(matches!(typing, ClientEvent::Typing { .. }));

        let read: ClientEvent =
            serde_json::from_str(&format!(r#"{{"type":"mark_read","case_id":"{case_id}"}}"#)).unwrap();
        assert!(matches!(read, ClientEvent::MarkRead { .. }));
    }

    #[test]
    fn test_unknown_frame_rejected() {
        let result = serde_json::from_str::<ClientEvent>(r#"{"type":"disconnect_everyone"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_server_frames_are_tagged() {
        let case_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();

        let frame = serde_json::to_value(ServerEvent::Typing { case_id, user_id }).unwrap();
        assert_eq!(frame["type"], "typing");
        assert_eq!(frame["case_id"], case_id.to_string());

        let frame = serde_json::to_value(ServerEvent::Error {
            message: "not a participant".to_string(),
        })
        .unwrap();
        assert_eq!(frame["type"], "error");
    }
}
