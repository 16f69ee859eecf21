//! Wire message type definitions.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Message categories carried over the real-time connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// User-facing notification.
    Notification,
    /// Chat message.
    Chat,
    /// Control and state updates, including room join/leave.
    Update,
    /// Room presence join/leave.
    Presence,
    /// Activity feed entry.
    Activity,
    /// Collaborative editing update (cursors, selections).
    Collaboration,
}

impl MessageType {
    /// Every message type, in declaration order.
    pub const ALL: [MessageType; 6] = [
        Self::Notification,
        Self::Chat,
        Self::Update,
        Self::Presence,
        Self::Activity,
        Self::Collaboration,
    ];

    /// Converts to string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Notification => "notification",
            Self::Chat => "chat",
            Self::Update => "update",
            Self::Presence => "presence",
            Self::Activity => "activity",
            Self::Collaboration => "collaboration",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message as it travels on the wire.
///
/// `id` and `timestamp` are always assigned by the connection manager at
/// send time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    /// Unique message ID.
    pub id: String,
    /// Message category.
    #[serde(rename = "type")]
    pub message_type: MessageType,
    /// Message body; its shape is the consumer's concern.
    #[serde(default)]
    pub data: serde_json::Value,
    /// Send time.
    pub timestamp: DateTime<Utc>,
    /// Sending participant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    /// Target room.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
}

/// A message as supplied by a caller of `send`, before stamping.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMessage {
    /// Message category.
    pub message_type: MessageType,
    /// Message body.
    pub data: serde_json::Value,
    /// Sending participant.
    pub sender: Option<String>,
    /// Target room.
    pub room: Option<String>,
}

impl OutgoingMessage {
    /// Creates a draft with no sender or room.
    pub fn new(message_type: MessageType, data: serde_json::Value) -> Self {
        Self {
            message_type,
            data,
            sender: None,
            room: None,
        }
    }

    /// Sets the target room.
    pub fn with_room(mut self, room: impl Into<String>) -> Self {
        self.room = Some(room.into());
        self
    }

    /// Sets the sender.
    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    /// Assigns a fresh id and the current time.
    pub fn stamp(self) -> WireMessage {
        WireMessage {
            id: Uuid::new_v4().to_string(),
            message_type: self.message_type,
            data: self.data,
            timestamp: Utc::now(),
            sender: self.sender,
            room: self.room,
        }
    }
}
