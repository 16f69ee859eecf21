//! Consumer services built on the connection manager: notifications, chat
//! and collaboration presence.
//!
//! Each service depends only on [`MessageBus`], so it can run over a live
//! [`ConnectionManager`] or any other message transport.

pub mod chat;
pub mod collaboration;
pub mod notification;

use crate::connection::{ConnectionManager, HandlerId};
use crate::error::RealtimeResult;
use crate::listener::Listener;
use crate::message::{MessageType, OutgoingMessage, WireMessage};

pub use chat::{ChatService, DEFAULT_ROOM};
pub use collaboration::CollaborationService;
pub use notification::NotificationService;

/// Send and per-type receive, as needed by the consumer services.
pub trait MessageBus: Send + Sync {
    /// Sends one message; see [`ConnectionManager::send`].
    fn send(&self, message: OutgoingMessage) -> RealtimeResult<WireMessage>;

    /// Registers a handler for one message type.
    fn subscribe_to_type(
        &self,
        message_type: MessageType,
        handler: Listener<WireMessage>,
    ) -> HandlerId;

    /// Removes one handler.
    fn remove_handler(&self, id: HandlerId) -> bool;
}

impl MessageBus for ConnectionManager {
    fn send(&self, message: OutgoingMessage) -> RealtimeResult<WireMessage> {
        ConnectionManager::send(self, message)
    }

    fn subscribe_to_type(
        &self,
        message_type: MessageType,
        handler: Listener<WireMessage>,
    ) -> HandlerId {
        ConnectionManager::subscribe_to_type(self, message_type, move |message: &WireMessage| {
            handler(message)
        })
    }

    fn remove_handler(&self, id: HandlerId) -> bool {
        ConnectionManager::remove_handler(self, id)
    }
}
