//! Notification inbox fed by inbound `notification` messages.

use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::json;
use tracing::debug;

use crate::connection::HandlerId;
use crate::listener::{Listener, invoke_isolated};
use crate::message::{MessageType, WireMessage};
use crate::subscription::Subscription;

use super::MessageBus;

#[derive(Default)]
struct Inbox {
    notifications: Vec<WireMessage>,
    listeners: Vec<(u64, Listener<WireMessage>)>,
}

/// Keeps every received notification, oldest first.
pub struct NotificationService {
    bus: Arc<dyn MessageBus>,
    inbox: Arc<Mutex<Inbox>>,
    handler: HandlerId,
    next_listener: AtomicU64,
}

impl NotificationService {
    /// Attaches to a bus.
    pub fn new(bus: Arc<dyn MessageBus>) -> Self {
        let inbox: Arc<Mutex<Inbox>> = Arc::default();
        let sink = Arc::clone(&inbox);
        let handler = bus.subscribe_to_type(
            MessageType::Notification,
            Arc::new(move |message: &WireMessage| {
                let listeners: Vec<Listener<WireMessage>> = {
                    let mut inbox = sink.lock().unwrap_or_else(|e| e.into_inner());
                    inbox.notifications.push(message.clone());
                    inbox.listeners.iter().map(|(_, l)| l.clone()).collect()
                };
                debug!(id = %message.id, "Notification received");
                for listener in &listeners {
                    invoke_isolated(listener.as_ref(), message, "notification");
                }
            }),
        );
        Self {
            bus,
            inbox,
            handler,
            next_listener: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inbox> {
        self.inbox.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// All notifications received so far.
    pub fn notifications(&self) -> Vec<WireMessage> {
        self.lock().notifications.clone()
    }

    /// Notifications whose `data.read` is not `true`.
    pub fn unread_count(&self) -> usize {
        self.lock()
            .notifications
            .iter()
            .filter(|n| n.data.get("read").and_then(|r| r.as_bool()) != Some(true))
            .count()
    }

    /// Sets `data.read = true` on the notification with `id`.
    ///
    /// Returns `false` when no such notification exists or its data is not
    /// an object.
    pub fn mark_as_read(&self, id: &str) -> bool {
        let mut inbox = self.lock();
        let Some(notification) = inbox.notifications.iter_mut().find(|n| n.id == id) else {
            return false;
        };
        if notification.data.is_null() {
            notification.data = json!({});
        }
        match notification.data.as_object_mut() {
            Some(data) => {
                data.insert("read".to_string(), json!(true));
                true
            }
            None => false,
        }
    }

    /// Drops every stored notification.
    pub fn clear(&self) {
        self.lock().notifications.clear();
    }

    /// Registers a handler for each new notification.
    pub fn on_notification<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&WireMessage) + Send + Sync + 'static,
    {
        let id = self.next_listener.fetch_add(1, Ordering::Relaxed);
        self.lock().listeners.push((id, Arc::new(handler)));
        let inbox = Arc::clone(&self.inbox);
        Subscription::new(move || {
            inbox
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .listeners
                .retain(|(lid, _)| *lid != id);
        })
    }

    /// Stops receiving notifications from the bus.
    pub fn detach(&self) {
        self.bus.remove_handler(self.handler);
    }
}
