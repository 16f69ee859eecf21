//! Realtime layer metrics.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Counters shared by the registry, publisher and connection manager.
#[derive(Debug, Default)]
pub struct RealtimeMetrics {
    /// Messages written to the socket
    pub messages_sent: AtomicU64,
    /// Messages read from the socket and dispatched
    pub messages_received: AtomicU64,
    /// Inbound messages or change notifications dropped as undecodable
    pub malformed_dropped: AtomicU64,
    /// Events durably published
    pub events_published: AtomicU64,
    /// Listener invocations for published events
    pub events_delivered: AtomicU64,
    /// Publishes rejected by the broker
    pub publish_failures: AtomicU64,
    /// Reconnect attempts scheduled
    pub reconnect_attempts: AtomicU64,
    /// Listener or handler panics contained
    pub listener_panics: AtomicU64,
}

impl RealtimeMetrics {
    /// Create new zeroed metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message sent
    pub fn message_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a message received
    pub fn message_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a dropped malformed payload
    pub fn malformed(&self) {
        self.malformed_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful publish
    pub fn event_published(&self) {
        self.events_published.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one listener invocation
    pub fn event_delivered(&self) {
        self.events_delivered.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed publish
    pub fn publish_failed(&self) {
        self.publish_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a scheduled reconnect
    pub fn reconnect_scheduled(&self) {
        self.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a contained panic
    pub fn listener_panicked(&self) {
        self.listener_panics.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            malformed_dropped: self.malformed_dropped.load(Ordering::Relaxed),
            events_published: self.events_published.load(Ordering::Relaxed),
            events_delivered: self.events_delivered.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            reconnect_attempts: self.reconnect_attempts.load(Ordering::Relaxed),
            listener_panics: self.listener_panics.load(Ordering::Relaxed),
        }
    }
}

/// Serializable metrics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Messages written to the socket
    pub messages_sent: u64,
    /// Messages read from the socket
    pub messages_received: u64,
    /// Malformed payloads dropped
    pub malformed_dropped: u64,
    /// Events published
    pub events_published: u64,
    /// Listener invocations
    pub events_delivered: u64,
    /// Failed publishes
    pub publish_failures: u64,
    /// Reconnect attempts scheduled
    pub reconnect_attempts: u64,
    /// Contained listener panics
    pub listener_panics: u64,
}
