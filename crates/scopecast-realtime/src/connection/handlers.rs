//! Per-type message handlers and connection-status observers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::listener::{Listener, invoke_isolated};
use crate::message::{MessageType, WireMessage};

use super::state::ConnectionStatus;

/// Identifies one registered message handler.
pub type HandlerId = u64;

/// Handlers keyed by message type, kept in registration order.
#[derive(Default)]
pub(crate) struct HandlerTable {
    handlers: Mutex<HashMap<MessageType, Vec<(HandlerId, Listener<WireMessage>)>>>,
    next_id: AtomicU64,
}

impl HandlerTable {
    pub(crate) fn add(
        &self,
        message_type: MessageType,
        handler: Listener<WireMessage>,
    ) -> HandlerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.handlers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(message_type)
            .or_default()
            .push((id, handler));
        id
    }

    /// Removes one handler. Returns whether it was registered.
    pub(crate) fn remove(&self, id: HandlerId) -> bool {
        let mut handlers = self.handlers.lock().unwrap_or_else(|e| e.into_inner());
        let mut removed = false;
        handlers.retain(|_, set| {
            let before = set.len();
            set.retain(|(hid, _)| *hid != id);
            removed |= set.len() != before;
            !set.is_empty()
        });
        removed
    }

    /// Removes every handler of a type. Returns how many were removed.
    pub(crate) fn remove_type(&self, message_type: MessageType) -> usize {
        self.handlers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&message_type)
            .map(|set| set.len())
            .unwrap_or(0)
    }

    /// Snapshot of the handlers for a type.
    pub(crate) fn for_type(&self, message_type: MessageType) -> Vec<Listener<WireMessage>> {
        self.handlers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&message_type)
            .map(|set| set.iter().map(|(_, h)| h.clone()).collect())
            .unwrap_or_default()
    }

    pub(crate) fn count(&self, message_type: MessageType) -> usize {
        self.handlers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&message_type)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

/// Connection-status observers.
#[derive(Default)]
pub(crate) struct ObserverSet {
    observers: Arc<Mutex<Vec<(u64, Listener<ConnectionStatus>)>>>,
    next_id: AtomicU64,
}

impl ObserverSet {
    pub(crate) fn add(&self, observer: Listener<ConnectionStatus>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.observers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, observer));
        id
    }

    /// Shared handle used by the removal closure of a subscription.
    pub(crate) fn shared(&self) -> Arc<Mutex<Vec<(u64, Listener<ConnectionStatus>)>>> {
        Arc::clone(&self.observers)
    }

    /// Invokes every observer on a snapshot; no lock is held while they run.
    pub(crate) fn notify(&self, status: &ConnectionStatus) -> usize {
        let snapshot: Vec<Listener<ConnectionStatus>> = self
            .observers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, o)| o.clone())
            .collect();
        snapshot
            .iter()
            .filter(|observer| !invoke_isolated(observer.as_ref(), status, "connection_status"))
            .count()
    }
}
