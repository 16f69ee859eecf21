//! Publish/subscribe broker abstraction.
//!
//! A broker performs the durable write for a published event and announces
//! the stored record on every topic (scope key) the record matches. The
//! channel registry is written against [`EventBroker`] only, so the same
//! registry runs over [`MemoryBroker`] in tests and a durable backend in
//! production.

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod topics;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::RealtimeResult;
use crate::event::EventRecord;

pub use memory::MemoryBroker;
#[cfg(feature = "postgres")]
pub use postgres::PostgresBroker;
pub use topics::TopicTable;

/// Receives the raw change payload of every record announced on a topic.
pub type ChangeSink = Arc<dyn Fn(&serde_json::Value) + Send + Sync>;

/// Identifier of one underlying broker subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BrokerSubscriptionId(pub u64);

impl fmt::Display for BrokerSubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Durable publish plus topic-keyed change notification.
#[async_trait]
pub trait EventBroker: Send + Sync + fmt::Debug {
    /// Durably records an event. Resolves once the write is acknowledged.
    ///
    /// Records published through one broker are announced to each topic in
    /// publish order.
    async fn publish(&self, record: &EventRecord) -> RealtimeResult<()>;

    /// Starts delivering change payloads for `topic` to `sink`.
    fn subscribe(&self, topic: &str, sink: ChangeSink) -> RealtimeResult<BrokerSubscriptionId>;

    /// Stops a subscription. Unknown ids are ignored.
    fn unsubscribe(&self, id: BrokerSubscriptionId);

    /// Number of live subscriptions on `topic`.
    fn subscription_count(&self, topic: &str) -> usize;

    /// Releases background resources.
    async fn shutdown(&self) {}
}
