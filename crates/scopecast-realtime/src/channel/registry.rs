//! Channel registry — maps scope keys to one broker subscription each while
//! presenting any number of independent listeners.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, info, warn};

use crate::broker::{ChangeSink, EventBroker};
use crate::error::RealtimeResult;
use crate::event::{Event, EventKind, EventRecord};
use crate::listener::{Listener, invoke_isolated};
use crate::metrics::RealtimeMetrics;
use crate::publisher::EventPublisher;
use crate::subscription::Subscription;

use super::channel::{Channel, ListenerId};

/// Registry of all live scope channels.
///
/// A channel exists exactly while it has at least one listener, and owns
/// the single broker subscription for its scope. Adding or removing a
/// listener and the resulting create/teardown decision happen under the
/// same map-entry lock.
#[derive(Debug)]
pub struct ChannelRegistry {
    /// Scope key → channel.
    channels: Arc<DashMap<String, Channel>>,
    /// Broker the channels subscribe to.
    broker: Arc<dyn EventBroker>,
    /// Durable write path.
    publisher: EventPublisher,
    /// Shared counters.
    metrics: Arc<RealtimeMetrics>,
    next_listener: AtomicU64,
}

impl ChannelRegistry {
    /// Creates a registry over a broker.
    pub fn new(broker: Arc<dyn EventBroker>, metrics: Arc<RealtimeMetrics>) -> Self {
        Self {
            channels: Arc::new(DashMap::new()),
            publisher: EventPublisher::new(Arc::clone(&broker), Arc::clone(&metrics)),
            broker,
            metrics,
            next_listener: AtomicU64::new(1),
        }
    }

    /// Registers `callback` for every event matching `scope_key`.
    ///
    /// Creates the channel and its broker subscription on first use. The
    /// returned handle removes the callback and tears the channel down when
    /// it was the last one.
    pub fn subscribe_to_scope<F>(
        &self,
        scope_key: &str,
        callback: F,
    ) -> RealtimeResult<Subscription>
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let listener_id = self.next_listener.fetch_add(1, Ordering::Relaxed);
        let listener: Listener<Event> = Arc::new(callback);

        match self.channels.entry(scope_key.to_string()) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().subscribe(listener_id, listener);
            }
            Entry::Vacant(entry) => {
                let sink = channel_sink(
                    Arc::clone(&self.channels),
                    scope_key.to_string(),
                    Arc::clone(&self.metrics),
                );
                let broker_subscription = self.broker.subscribe(scope_key, sink)?;
                let mut channel = Channel::new(scope_key.to_string(), broker_subscription);
                channel.subscribe(listener_id, listener);
                entry.insert(channel);
                info!(
                    scope = %scope_key,
                    subscription = %broker_subscription,
                    "Channel created"
                );
            }
        }

        debug!(scope = %scope_key, listener = listener_id, "Listener added");

        let channels = Arc::clone(&self.channels);
        let broker = Arc::clone(&self.broker);
        let key = scope_key.to_string();
        Ok(Subscription::new(move || {
            remove_listener(&channels, broker.as_ref(), &key, listener_id);
        }))
    }

    /// Like [`ChannelRegistry::subscribe_to_scope`], but `callback` only sees
    /// events whose kind is in `kinds`. An empty slice accepts every kind.
    ///
    /// The filter runs in front of the callback; the scope still owns a
    /// single channel and broker subscription.
    pub fn subscribe_to_scope_kinds<F>(
        &self,
        scope_key: &str,
        kinds: &[EventKind],
        callback: F,
    ) -> RealtimeResult<Subscription>
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        if kinds.is_empty() {
            return self.subscribe_to_scope(scope_key, callback);
        }
        let kinds = kinds.to_vec();
        self.subscribe_to_scope(scope_key, move |event| {
            if kinds.contains(&event.kind) {
                callback(event);
            }
        })
    }

    /// Writes an event through the durable publisher.
    ///
    /// Fan-out happens when the broker announces the stored record, not
    /// here. Failures are returned as-is; there is no retry at this layer.
    pub async fn publish_event(&self, event: &Event) -> RealtimeResult<()> {
        self.publisher.publish(event).await
    }

    /// The publisher used by [`ChannelRegistry::publish_event`].
    pub fn publisher(&self) -> &EventPublisher {
        &self.publisher
    }

    /// Returns total number of live channels.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Returns whether a channel exists for a scope.
    pub fn has_channel(&self, scope_key: &str) -> bool {
        self.channels.contains_key(scope_key)
    }

    /// Returns listener count for a scope.
    pub fn listener_count(&self, scope_key: &str) -> usize {
        self.channels
            .get(scope_key)
            .map(|ch| ch.listener_count())
            .unwrap_or(0)
    }

    /// Scope keys with a live channel, sorted.
    pub fn active_scopes(&self) -> Vec<String> {
        let mut scopes: Vec<String> = self.channels.iter().map(|e| e.key().clone()).collect();
        scopes.sort();
        scopes
    }

    /// Tears down every channel and its broker subscription.
    ///
    /// Outstanding [`Subscription`] handles become no-ops.
    pub fn clear(&self) {
        let keys: Vec<String> = self.channels.iter().map(|e| e.key().clone()).collect();
        for key in keys {
            if let Some((_, channel)) = self.channels.remove(&key) {
                self.broker.unsubscribe(channel.broker_subscription);
                info!(scope = %key, "Channel torn down");
            }
        }
    }
}

/// Removes one listener; drops the channel and its broker subscription when
/// the listener set becomes empty.
fn remove_listener(
    channels: &DashMap<String, Channel>,
    broker: &dyn EventBroker,
    scope_key: &str,
    listener_id: ListenerId,
) {
    let Entry::Occupied(mut entry) = channels.entry(scope_key.to_string()) else {
        return;
    };
    if !entry.get_mut().unsubscribe(listener_id) {
        return;
    }
    debug!(scope = %scope_key, listener = listener_id, "Listener removed");

    if entry.get().is_empty() {
        broker.unsubscribe(entry.get().broker_subscription);
        entry.remove();
        info!(scope = %scope_key, "Channel torn down");
    }
}

/// Builds the change-notification handler for one scope.
///
/// Decodes the raw record and invokes every listener of the scope once, in
/// registration order, on a snapshot taken without holding the map lock.
fn channel_sink(
    channels: Arc<DashMap<String, Channel>>,
    scope_key: String,
    metrics: Arc<RealtimeMetrics>,
) -> ChangeSink {
    Arc::new(move |change: &serde_json::Value| {
        let event = match EventRecord::decode_change(change) {
            Ok(event) => event,
            Err(e) => {
                metrics.malformed();
                warn!(
                    scope = %scope_key,
                    error = %e,
                    "Dropping undecodable change notification"
                );
                return;
            }
        };

        let listeners = match channels.get(&scope_key) {
            Some(channel) => channel.listeners(),
            None => {
                debug!(scope = %scope_key, "No listeners for scope; event dropped");
                return;
            }
        };

        for listener in &listeners {
            if invoke_isolated(listener.as_ref(), &event, &scope_key) {
                metrics.event_delivered();
            } else {
                metrics.listener_panicked();
            }
        }
    })
}
