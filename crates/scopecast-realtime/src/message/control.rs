//! Room control sub-protocol carried in `update` messages.

use serde::{Deserialize, Serialize};

use super::types::{MessageType, OutgoingMessage};

/// Room membership action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomAction {
    /// Enter a room.
    JoinRoom,
    /// Leave a room.
    LeaveRoom,
}

/// Body of a room control message: `{ action, room }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomControl {
    /// Requested action.
    pub action: RoomAction,
    /// Room name.
    pub room: String,
}

impl RoomControl {
    /// Builds the `update` message carrying this control body.
    pub fn into_message(self) -> OutgoingMessage {
        OutgoingMessage::new(
            MessageType::Update,
            serde_json::json!({ "action": self.action, "room": self.room }),
        )
    }

    /// Parses a control body out of an `update` message's data.
    pub fn from_data(data: &serde_json::Value) -> Option<Self> {
        serde_json::from_value(data.clone()).ok()
    }
}
