//! Single scope channel with its listener set.

use crate::broker::BrokerSubscriptionId;
use crate::event::Event;
use crate::listener::Listener;

/// Identifier of one listener within a channel.
pub type ListenerId = u64;

/// Pairs the one broker subscription of a scope with every callback
/// currently interested in it.
pub struct Channel {
    /// Scope key.
    pub name: String,
    /// Underlying broker subscription, owned exclusively by this channel.
    pub broker_subscription: BrokerSubscriptionId,
    /// Listeners in registration order.
    listeners: Vec<(ListenerId, Listener<Event>)>,
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.name)
            .field("broker_subscription", &self.broker_subscription)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Channel {
    /// Creates a channel with no listeners.
    pub fn new(name: String, broker_subscription: BrokerSubscriptionId) -> Self {
        Self {
            name,
            broker_subscription,
            listeners: Vec::new(),
        }
    }

    /// Appends a listener.
    pub fn subscribe(&mut self, id: ListenerId, listener: Listener<Event>) {
        self.listeners.push((id, listener));
    }

    /// Removes a listener. Returns whether it was present.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() < before
    }

    /// Returns listener count.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Returns whether the channel has any listeners.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Snapshot of the listeners, in registration order.
    pub fn listeners(&self) -> Vec<Listener<Event>> {
        self.listeners.iter().map(|(_, l)| l.clone()).collect()
    }
}
