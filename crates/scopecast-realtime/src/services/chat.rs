//! Per-room chat history over the message bus.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::json;

use crate::connection::HandlerId;
use crate::error::RealtimeResult;
use crate::listener::{Listener, invoke_isolated};
use crate::message::{MessageType, OutgoingMessage, RoomAction, RoomControl, WireMessage};
use crate::subscription::Subscription;

use super::MessageBus;

/// Room used for chat messages that carry no room.
pub const DEFAULT_ROOM: &str = "general";

type History = Vec<WireMessage>;

#[derive(Default)]
struct Rooms {
    history: HashMap<String, History>,
    listeners: HashMap<String, Vec<(u64, Listener<History>)>>,
}

/// Chat rooms: sending, membership and received history.
pub struct ChatService {
    bus: Arc<dyn MessageBus>,
    rooms: Arc<Mutex<Rooms>>,
    handler: HandlerId,
    next_listener: AtomicU64,
}

impl ChatService {
    /// Attaches to a bus.
    pub fn new(bus: Arc<dyn MessageBus>) -> Self {
        let rooms: Arc<Mutex<Rooms>> = Arc::default();
        let sink = Arc::clone(&rooms);
        let handler = bus.subscribe_to_type(
            MessageType::Chat,
            Arc::new(move |message: &WireMessage| {
                let room = message.room.as_deref().unwrap_or(DEFAULT_ROOM).to_string();
                let (history, listeners) = {
                    let mut rooms = sink.lock().unwrap_or_else(|e| e.into_inner());
                    let history = rooms.history.entry(room.clone()).or_default();
                    history.push(message.clone());
                    let history = history.clone();
                    let listeners: Vec<Listener<History>> = rooms
                        .listeners
                        .get(&room)
                        .map(|set| set.iter().map(|(_, l)| l.clone()).collect())
                        .unwrap_or_default();
                    (history, listeners)
                };
                for listener in &listeners {
                    invoke_isolated(listener.as_ref(), &history, &room);
                }
            }),
        );
        Self {
            bus,
            rooms,
            handler,
            next_listener: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Rooms> {
        self.rooms.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Sends a chat message to a room.
    pub fn send_message(
        &self,
        room: &str,
        content: &str,
        sender: &str,
    ) -> RealtimeResult<WireMessage> {
        let data = json!({ "content": content, "sender": sender });
        self.bus
            .send(OutgoingMessage::new(MessageType::Chat, data).with_room(room))
    }

    /// Joins a chat room.
    pub fn join_chat_room(&self, room: &str) -> RealtimeResult<WireMessage> {
        self.room_control(RoomAction::JoinRoom, room)
    }

    /// Leaves a chat room.
    pub fn leave_chat_room(&self, room: &str) -> RealtimeResult<WireMessage> {
        self.room_control(RoomAction::LeaveRoom, room)
    }

    fn room_control(&self, action: RoomAction, room: &str) -> RealtimeResult<WireMessage> {
        self.bus.send(
            RoomControl {
                action,
                room: room.to_string(),
            }
            .into_message(),
        )
    }

    /// Registers a handler called with the room's full history after every
    /// new message.
    pub fn on_message<F>(&self, room: &str, handler: F) -> Subscription
    where
        F: Fn(&History) + Send + Sync + 'static,
    {
        let id = self.next_listener.fetch_add(1, Ordering::Relaxed);
        self.lock()
            .listeners
            .entry(room.to_string())
            .or_default()
            .push((id, Arc::new(handler)));

        let rooms = Arc::clone(&self.rooms);
        let room = room.to_string();
        Subscription::new(move || {
            let mut rooms = rooms.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(set) = rooms.listeners.get_mut(&room) {
                set.retain(|(lid, _)| *lid != id);
                if set.is_empty() {
                    rooms.listeners.remove(&room);
                }
            }
        })
    }

    /// Messages received for a room, oldest first.
    pub fn messages(&self, room: &str) -> History {
        self.lock().history.get(room).cloned().unwrap_or_default()
    }

    /// Stops receiving chat messages from the bus.
    pub fn detach(&self) {
        self.bus.remove_handler(self.handler);
    }
}
