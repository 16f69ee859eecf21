//! Collaboration presence and live-edit updates over the message bus.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::json;
use tracing::debug;

use crate::connection::HandlerId;
use crate::error::RealtimeResult;
use crate::listener::{Listener, invoke_isolated};
use crate::message::{MessageType, OutgoingMessage, WireMessage};
use crate::presence::{Participants, RoomPresence};
use crate::subscription::Subscription;

use super::MessageBus;
use super::chat::DEFAULT_ROOM;

/// Participant id used when a presence message names nobody.
const UNKNOWN_PARTICIPANT: &str = "unknown";

/// Mirrors remote presence into a [`RoomPresence`] and relays
/// `collaboration` messages.
pub struct CollaborationService {
    bus: Arc<dyn MessageBus>,
    presence: Arc<RoomPresence>,
    updates: Arc<Mutex<Vec<(u64, Listener<WireMessage>)>>>,
    handlers: [HandlerId; 2],
    next_listener: AtomicU64,
}

impl CollaborationService {
    /// Attaches to a bus with a fresh presence tracker.
    pub fn new(bus: Arc<dyn MessageBus>) -> Self {
        Self::with_presence(bus, Arc::new(RoomPresence::new()))
    }

    /// Attaches to a bus, recording presence into `presence`.
    pub fn with_presence(bus: Arc<dyn MessageBus>, presence: Arc<RoomPresence>) -> Self {
        let tracker = Arc::clone(&presence);
        let presence_handler = bus.subscribe_to_type(
            MessageType::Presence,
            Arc::new(move |message: &WireMessage| apply_presence(&tracker, message)),
        );

        let updates: Arc<Mutex<Vec<(u64, Listener<WireMessage>)>>> = Arc::default();
        let relay = Arc::clone(&updates);
        let update_handler = bus.subscribe_to_type(
            MessageType::Collaboration,
            Arc::new(move |message: &WireMessage| {
                let listeners: Vec<Listener<WireMessage>> = relay
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .iter()
                    .map(|(_, l)| l.clone())
                    .collect();
                for listener in &listeners {
                    invoke_isolated(listener.as_ref(), message, "collaboration");
                }
            }),
        );

        Self {
            bus,
            presence,
            updates,
            handlers: [presence_handler, update_handler],
            next_listener: AtomicU64::new(0),
        }
    }

    /// Announces `user_id` in a room.
    pub fn join_collaboration(&self, room: &str, user_id: &str) -> RealtimeResult<WireMessage> {
        self.announce(room, "join", user_id)
    }

    /// Announces that `user_id` left a room.
    pub fn leave_collaboration(&self, room: &str, user_id: &str) -> RealtimeResult<WireMessage> {
        self.announce(room, "leave", user_id)
    }

    fn announce(&self, room: &str, action: &str, user_id: &str) -> RealtimeResult<WireMessage> {
        let data = json!({ "action": action, "userId": user_id });
        self.bus
            .send(OutgoingMessage::new(MessageType::Presence, data).with_room(room))
    }

    /// Registers a listener for the participant list of a room.
    pub fn on_presence_change<F>(&self, room: &str, handler: F) -> Subscription
    where
        F: Fn(&Participants) + Send + Sync + 'static,
    {
        self.presence.on_presence_change(room, handler)
    }

    /// Registers a listener for every `collaboration` message.
    pub fn on_collaboration_update<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&WireMessage) + Send + Sync + 'static,
    {
        let id = self.next_listener.fetch_add(1, Ordering::Relaxed);
        self.updates
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, Arc::new(handler)));
        let updates = Arc::clone(&self.updates);
        Subscription::new(move || {
            updates
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .retain(|(lid, _)| *lid != id);
        })
    }

    /// Current collaborators of a room, sorted.
    pub fn collaborators(&self, room: &str) -> Participants {
        self.presence.participants(room)
    }

    /// The presence tracker fed by this service.
    pub fn presence(&self) -> &Arc<RoomPresence> {
        &self.presence
    }

    /// Stops receiving presence and collaboration messages.
    pub fn detach(&self) {
        for id in self.handlers {
            self.bus.remove_handler(id);
        }
    }
}

/// Applies one inbound presence message. The participant is the sender,
/// falling back to `data.userId`.
fn apply_presence(presence: &RoomPresence, message: &WireMessage) {
    let room = message.room.as_deref().unwrap_or(DEFAULT_ROOM);
    let participant = message
        .sender
        .as_deref()
        .or_else(|| message.data.get("userId").and_then(|v| v.as_str()))
        .unwrap_or(UNKNOWN_PARTICIPANT);

    match message.data.get("action").and_then(|a| a.as_str()) {
        Some("join") => {
            presence.join(room, participant);
        }
        Some("leave") => {
            presence.leave(room, participant);
        }
        other => debug!(room = %room, action = ?other, "Ignoring presence message"),
    }
}
