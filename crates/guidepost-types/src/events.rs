use serde::{Deserialize, Serialize};

use crate::models::{Message, Participant, PresenceSnapshot};

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms the handshake and the identity it registered
    Ready { participant: Participant },

    /// Registry membership changed (or the client asked for it)
    PresenceSnapshot(PresenceSnapshot),

    /// A message addressed to (or echoed back to) this participant was stored
    MessageCreate(Message),
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Ask for the current presence snapshot, delivered to this connection only
    RequestPresence,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presence_event_is_tagged() {
        let event = GatewayEvent::PresenceSnapshot(PresenceSnapshot {
            counselors: vec![3],
            students: vec![7],
            all: vec![3, 7],
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "PresenceSnapshot");
        assert_eq!(json["data"]["counselors"], serde_json::json!([3]));
        assert_eq!(json["data"]["all"], serde_json::json!([3, 7]));
    }

    #[test]
    fn parses_request_presence_command() {
        let cmd: GatewayCommand = serde_json::from_str(r#"{"type":"RequestPresence"}"#).unwrap();
        assert_eq!(cmd, GatewayCommand::RequestPresence);
    }
}
