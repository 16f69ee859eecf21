//! Room presence — participant sets with full-set change broadcasts.

use std::collections::{BTreeSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;

use crate::listener::{Listener, invoke_isolated};
use crate::subscription::Subscription;

/// Participant list handed to presence listeners, sorted.
pub type Participants = Vec<String>;

type Broadcast = (Participants, Vec<Listener<Participants>>);

/// Pending broadcasts of one room, in mutation order.
#[derive(Default)]
struct Outbox {
    queue: VecDeque<Broadcast>,
    /// Set while some caller is draining `queue`.
    delivering: bool,
}

#[derive(Default)]
struct RoomState {
    participants: BTreeSet<String>,
    listeners: Vec<(u64, Listener<Participants>)>,
    outbox: Arc<Mutex<Outbox>>,
}

impl RoomState {
    fn is_idle(&self) -> bool {
        self.participants.is_empty() && self.listeners.is_empty()
    }

    /// Queues the current set for broadcast. Must be called under the
    /// room's entry lock so queue order equals mutation order.
    fn enqueue(&self) -> Arc<Mutex<Outbox>> {
        let broadcast = (
            self.participants.iter().cloned().collect(),
            self.listeners.iter().map(|(_, l)| l.clone()).collect(),
        );
        lock(&self.outbox).queue.push_back(broadcast);
        Arc::clone(&self.outbox)
    }
}

/// Tracks the participant set of every room.
///
/// Membership changes are idempotent set operations; a broadcast of the
/// full participant list happens only when the set actually changed.
///
/// Broadcasts run outside the room lock and reach listeners in mutation
/// order. A change made while the room is already delivering (from a
/// listener or another thread) is queued and delivered by the caller that
/// is draining, after the broadcast in progress.
#[derive(Default)]
pub struct RoomPresence {
    /// Room → state
    rooms: Arc<DashMap<String, RoomState>>,
    next_listener: AtomicU64,
}

impl std::fmt::Debug for RoomPresence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomPresence")
            .field("rooms", &self.rooms.len())
            .finish()
    }
}

impl RoomPresence {
    /// Create an empty presence tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a participant. Returns `true` and broadcasts when the set changed.
    pub fn join(&self, room: &str, participant_id: &str) -> bool {
        let outbox = {
            let mut state = self.rooms.entry(room.to_string()).or_default();
            if !state.participants.insert(participant_id.to_string()) {
                return false;
            }
            state.enqueue()
        };
        debug!(room = %room, participant = %participant_id, "Participant joined");
        deliver(room, &outbox);
        true
    }

    /// Removes a participant. Returns `true` and broadcasts when the set changed.
    pub fn leave(&self, room: &str, participant_id: &str) -> bool {
        let Entry::Occupied(mut entry) = self.rooms.entry(room.to_string()) else {
            return false;
        };
        if !entry.get_mut().participants.remove(participant_id) {
            return false;
        }
        let outbox = entry.get().enqueue();
        if entry.get().is_idle() {
            entry.remove();
        } else {
            drop(entry);
        }
        debug!(room = %room, participant = %participant_id, "Participant left");
        deliver(room, &outbox);
        true
    }

    /// Registers a listener invoked with the full participant list on every change.
    pub fn on_presence_change<F>(&self, room: &str, handler: F) -> Subscription
    where
        F: Fn(&Participants) + Send + Sync + 'static,
    {
        let id = self.next_listener.fetch_add(1, Ordering::Relaxed);
        self.rooms
            .entry(room.to_string())
            .or_default()
            .listeners
            .push((id, Arc::new(handler)));

        let rooms = Arc::clone(&self.rooms);
        let room = room.to_string();
        Subscription::new(move || {
            if let Entry::Occupied(mut entry) = rooms.entry(room) {
                entry.get_mut().listeners.retain(|(lid, _)| *lid != id);
                if entry.get().is_idle() {
                    entry.remove();
                }
            }
        })
    }

    /// Current participants of a room, sorted.
    pub fn participants(&self, room: &str) -> Participants {
        self.rooms
            .get(room)
            .map(|state| state.participants.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether a participant is in a room.
    pub fn is_present(&self, room: &str, participant_id: &str) -> bool {
        self.rooms
            .get(room)
            .map(|state| state.participants.contains(participant_id))
            .unwrap_or(false)
    }

    /// Number of rooms with participants or listeners.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

fn lock(outbox: &Mutex<Outbox>) -> MutexGuard<'_, Outbox> {
    outbox.lock().unwrap_or_else(|e| e.into_inner())
}

/// Drains the room's outbox unless another caller already is.
fn deliver(room: &str, outbox: &Mutex<Outbox>) {
    {
        let mut pending = lock(outbox);
        if pending.delivering {
            return;
        }
        pending.delivering = true;
    }
    loop {
        let (participants, listeners) = {
            let mut pending = lock(outbox);
            match pending.queue.pop_front() {
                Some(next) => next,
                None => {
                    pending.delivering = false;
                    return;
                }
            }
        };
        for listener in &listeners {
            invoke_isolated(listener.as_ref(), &participants, room);
        }
    }
}
