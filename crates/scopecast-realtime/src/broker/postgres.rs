//! PostgreSQL broker: durable insert plus `LISTEN`/`NOTIFY` change feed.
//!
//! Rows go into `realtime_events`; the trigger installed by the migrations
//! publishes each row as JSON on [`NOTIFY_CHANNEL`]. One background task
//! per broker holds a [`PgListener`] and routes every notification to the
//! local sinks of the topics the row matches. Notification payloads are
//! capped at 8000 bytes by PostgreSQL, which bounds event payload size.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgListener, PgPool, PgPoolOptions};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use scopecast_core::config::broker::BrokerConfig;

use crate::error::{RealtimeError, RealtimeResult};
use crate::event::EventRecord;

use super::topics::TopicTable;
use super::{BrokerSubscriptionId, ChangeSink, EventBroker};

/// Channel the migration's insert trigger passes to `pg_notify`.
pub const NOTIFY_CHANNEL: &str = "realtime_events";

/// Pause before polling the listener again after a receive error.
const LISTEN_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Broker backed by a PostgreSQL table and its notify channel.
#[derive(Debug)]
pub struct PostgresBroker {
    pool: PgPool,
    topics: Arc<TopicTable>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl PostgresBroker {
    /// Connects a pool from configuration, runs migrations and starts listening.
    pub async fn connect(config: &BrokerConfig) -> RealtimeResult<Self> {
        let url = config.database_url.as_deref().ok_or_else(|| {
            RealtimeError::Broker(
                "broker.database_url is required for the postgres backend".into(),
            )
        })?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(url)
            .await
            .map_err(|e| RealtimeError::Broker(format!("Failed to connect to database: {e}")))?;

        Self::migrate(&pool).await?;
        Self::from_pool(pool).await
    }

    /// Applies the `realtime_events` schema and trigger.
    pub async fn migrate(pool: &PgPool) -> RealtimeResult<()> {
        sqlx::migrate!("../../migrations")
            .run(pool)
            .await
            .map_err(|e| RealtimeError::Broker(format!("Failed to run migrations: {e}")))?;
        info!("Realtime event migrations applied");
        Ok(())
    }

    /// Starts listening on [`NOTIFY_CHANNEL`] using an existing pool.
    pub async fn from_pool(pool: PgPool) -> RealtimeResult<Self> {
        let mut listener = PgListener::connect_with(&pool)
            .await
            .map_err(|e| RealtimeError::Broker(format!("Failed to open listener: {e}")))?;
        listener.listen(NOTIFY_CHANNEL).await.map_err(|e| {
            RealtimeError::Broker(format!("Failed to LISTEN {NOTIFY_CHANNEL}: {e}"))
        })?;

        let topics = Arc::new(TopicTable::new());
        let task = tokio::spawn(run_listener(listener, Arc::clone(&topics)));
        info!(channel = NOTIFY_CHANNEL, "Postgres broker listening");

        Ok(Self {
            pool,
            topics,
            listener: Mutex::new(Some(task)),
        })
    }
}

/// Receives notifications until the task is aborted.
async fn run_listener(mut listener: PgListener, topics: Arc<TopicTable>) {
    loop {
        match listener.recv().await {
            Ok(notification) => route_notification(&topics, notification.payload()),
            Err(e) => {
                // PgListener reconnects on the next recv.
                warn!(error = %e, "Postgres listener receive failed");
                tokio::time::sleep(LISTEN_RETRY_DELAY).await;
            }
        }
    }
}

fn route_notification(topics: &TopicTable, payload: &str) {
    let change: serde_json::Value = match serde_json::from_str(payload) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "Dropping undecodable change notification");
            return;
        }
    };
    let record: EventRecord = match serde_json::from_value(change.clone()) {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, "Dropping change notification that is not an event record");
            return;
        }
    };
    let delivered = topics.dispatch(&record.scope_keys(), &change);
    debug!(event_type = %record.event_type, sinks = delivered, "Routed change notification");
}

#[async_trait]
impl EventBroker for PostgresBroker {
    async fn publish(&self, record: &EventRecord) -> RealtimeResult<()> {
        sqlx::query(
            "INSERT INTO realtime_events \
             (event_type, user_id, organization_id, room, payload, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&record.event_type)
        .bind(&record.user_id)
        .bind(&record.organization_id)
        .bind(&record.room)
        .bind(sqlx::types::Json(&record.payload))
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!(event_type = %record.event_type, error = %e, "Failed to insert realtime event");
            RealtimeError::PublishFailure(e.to_string())
        })?;
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
        let task = self
            .listener
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(task) = task {
            task.abort();
        }
        self.topics.clear();
        self.pool.close().await;
        info!("Postgres broker shut down");
    }
}
