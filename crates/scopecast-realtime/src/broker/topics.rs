//! Local topic → sink routing shared by broker implementations.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tracing::debug;

use crate::event::ScopeKey;

use super::{BrokerSubscriptionId, ChangeSink};

/// Routing table from topic names to subscribed sinks, with a reverse index
/// from subscription id to topic.
#[derive(Default)]
pub struct TopicTable {
    /// Topic → sinks in subscription order.
    topics: DashMap<String, Vec<(BrokerSubscriptionId, ChangeSink)>>,
    /// Subscription id → topic.
    owners: DashMap<BrokerSubscriptionId, String>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for TopicTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopicTable")
            .field("topics", &self.topics.len())
            .field("subscriptions", &self.owners.len())
            .finish()
    }
}

impl TopicTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a sink on a topic.
    pub fn add(&self, topic: &str, sink: ChangeSink) -> BrokerSubscriptionId {
        let id = BrokerSubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.topics
            .entry(topic.to_string())
            .or_default()
            .push((id, sink));
        self.owners.insert(id, topic.to_string());
        debug!(topic = %topic, subscription = %id, "Broker subscription added");
        id
    }

    /// Removes a sink. Empty topics are dropped.
    pub fn remove(&self, id: BrokerSubscriptionId) -> bool {
        let Some((_, topic)) = self.owners.remove(&id) else {
            return false;
        };
        if let dashmap::mapref::entry::Entry::Occupied(mut entry) = self.topics.entry(topic.clone())
        {
            entry.get_mut().retain(|(sub_id, _)| *sub_id != id);
            if entry.get().is_empty() {
                entry.remove();
            }
        }
        debug!(topic = %topic, subscription = %id, "Broker subscription removed");
        true
    }

    /// Number of sinks on a topic.
    pub fn count(&self, topic: &str) -> usize {
        self.topics.get(topic).map(|sinks| sinks.len()).unwrap_or(0)
    }

    /// Total number of subscriptions.
    pub fn total(&self) -> usize {
        self.owners.len()
    }

    /// Snapshot of the sinks on a topic, in subscription order.
    pub fn sinks(&self, topic: &str) -> Vec<ChangeSink> {
        self.topics
            .get(topic)
            .map(|sinks| sinks.iter().map(|(_, sink)| sink.clone()).collect())
            .unwrap_or_default()
    }

    /// Delivers a change payload to every sink of every matched topic.
    ///
    /// No table lock is held while sinks run, so sinks may subscribe or
    /// unsubscribe. Returns the number of sink invocations.
    pub fn dispatch(&self, scopes: &[ScopeKey], change: &serde_json::Value) -> usize {
        let mut delivered = 0;
        for scope in scopes {
            for sink in self.sinks(&scope.to_channel_name()) {
                sink(change);
                delivered += 1;
            }
        }
        delivered
    }

    /// Drops every subscription.
    pub fn clear(&self) {
        self.topics.clear();
        self.owners.clear();
    }
}
