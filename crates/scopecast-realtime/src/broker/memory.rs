//! In-memory broker for single-process deployments and tests.

use std::sync::Mutex;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{RealtimeError, RealtimeResult};
use crate::event::EventRecord;

use super::topics::TopicTable;
use super::{BrokerSubscriptionId, ChangeSink, EventBroker};

/// In-memory broker.
///
/// `publish` synchronously announces the record on every matched topic
/// before returning. Publishes are serialized, so each topic observes
/// records in publish order. Nothing is retained after delivery unless the
/// broker was built with [`MemoryBroker::recording`].
#[derive(Debug, Default)]
pub struct MemoryBroker {
    /// Written records, kept only when recording; its lock also serializes
    /// announcements.
    log: tokio::sync::Mutex<Vec<EventRecord>>,
    recording: bool,
    /// Topic routing.
    topics: TopicTable,
    /// Failure injected into the next publish.
    fail_next: Mutex<Option<String>>,
}

impl MemoryBroker {
    /// Creates an empty broker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a broker that keeps every written record for inspection.
    pub fn recording() -> Self {
        Self {
            recording: true,
            ..Self::default()
        }
    }

    /// Makes the next `publish` fail with `reason` without writing anything.
    pub fn fail_next_publish(&self, reason: impl Into<String>) {
        *self.fail_next.lock().unwrap_or_else(|e| e.into_inner()) = Some(reason.into());
    }

    /// Snapshot of every record written so far. Always empty unless recording.
    pub async fn records(&self) -> Vec<EventRecord> {
        self.log.lock().await.clone()
    }

    /// Total number of live subscriptions across all topics.
    pub fn total_subscriptions(&self) -> usize {
        self.topics.total()
    }
}

#[async_trait]
impl EventBroker for MemoryBroker {
    async fn publish(&self, record: &EventRecord) -> RealtimeResult<()> {
        let mut log = self.log.lock().await;

        let injected = self
            .fail_next
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(reason) = injected {
            warn!(
                event_type = %record.event_type,
                reason = %reason,
                "Memory broker write rejected"
            );
            return Err(RealtimeError::PublishFailure(reason));
        }

        let change = record.to_change()?;
        if self.recording {
            log.push(record.clone());
        }

        let delivered = self.topics.dispatch(&record.scope_keys(), &change);
        debug!(
            event_type = %record.event_type,
            sinks = delivered,
            "Memory broker announced record"
        );
        Ok(())
    }

    fn subscribe(&self, topic: &str, sink: ChangeSink) -> RealtimeResult<BrokerSubscriptionId> {
        Ok(self.topics.add(topic, sink))
    }

    fn unsubscribe(&self, id: BrokerSubscriptionId) {
        self.topics.remove(id);
    }

    fn subscription_count(&self, topic: &str) -> usize {
        self.topics.count(topic)
    }

    async fn shutdown(&self) {
        self.topics.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;

    use crate::event::{Event, ScopeAttributes};

    fn record(org: &str, seq: u64) -> EventRecord {
        EventRecord::from_event(&Event::new(
            "team_activity",
            ScopeAttributes::organization(org),
            json!({ "seq": seq }),
        ))
    }

    #[tokio::test]
    async fn test_publish_appends_and_announces_in_order() {
        let broker = MemoryBroker::recording();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = seen.clone();
        broker
            .subscribe(
                "org:1",
                Arc::new(move |raw| {
                    sink_seen
                        .lock()
                        .unwrap()
                        .push(raw["payload"]["seq"].as_u64().unwrap());
                }),
            )
            .unwrap();

        for seq in 0..5 {
            broker.publish(&record("1", seq)).await.unwrap();
        }
        broker.publish(&record("2", 99)).await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3, 4]);
        assert_eq!(broker.records().await.len(), 6);
    }

    #[tokio::test]
    async fn test_injected_failure_writes_nothing() {
        let broker = MemoryBroker::recording();
        broker.fail_next_publish("disk full");

        let err = broker.publish(&record("1", 0)).await.unwrap_err();
        assert!(matches!(err, RealtimeError::PublishFailure(ref r) if r == "disk full"));
        assert!(broker.records().await.is_empty());

        broker.publish(&record("1", 1)).await.unwrap();
        assert_eq!(broker.records().await.len(), 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let broker = MemoryBroker::new();
        let id = broker
            .subscribe("org:1", Arc::new(|_| panic!("unsubscribed sink invoked")))
            .unwrap();
        assert_eq!(broker.subscription_count("org:1"), 1);
        broker.unsubscribe(id);
        assert_eq!(broker.subscription_count("org:1"), 0);
        broker.publish(&record("1", 0)).await.unwrap();
    }

    #[tokio::test]
    async fn test_default_broker_retains_nothing_after_delivery() {
        let broker = MemoryBroker::new();
        let delivered = Arc::new(Mutex::new(0usize));
        let counter = delivered.clone();
        broker
            .subscribe(
                "org:1",
                Arc::new(move |_| *counter.lock().unwrap() += 1),
            )
            .unwrap();

        for seq in 0..1_000 {
            broker.publish(&record("1", seq)).await.unwrap();
            broker.publish(&record("2", seq)).await.unwrap();
        }

        assert_eq!(*delivered.lock().unwrap(), 1_000);
        assert!(broker.records().await.is_empty());
        assert_eq!(broker.log.lock().await.capacity(), 0);
    }
}
