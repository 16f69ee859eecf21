//! Top-level hub tying the broker, channel registry and presence layer
//! together.

use std::sync::Arc;

use tracing::info;

use scopecast_core::config::broker::{BrokerBackend, BrokerConfig};

use crate::broker::{EventBroker, MemoryBroker};
use crate::channel::ChannelRegistry;
use crate::error::{RealtimeError, RealtimeResult};
use crate::event::{Event, EventKind, ScopeKey};
use crate::metrics::RealtimeMetrics;
use crate::presence::{Participants, RoomPresence};
use crate::publisher::EventPublisher;
use crate::subscription::Subscription;

/// Central real-time service object. Clones share all state.
#[derive(Clone)]
pub struct RealtimeHub {
    /// Channel registry.
    pub channels: Arc<ChannelRegistry>,
    /// Room presence.
    pub presence: Arc<RoomPresence>,
    /// Metrics collector.
    pub metrics: Arc<RealtimeMetrics>,
    broker: Arc<dyn EventBroker>,
}

impl std::fmt::Debug for RealtimeHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeHub")
            .field("broker", &self.broker)
            .field("channels", &self.channels.channel_count())
            .finish()
    }
}

impl RealtimeHub {
    /// Creates a hub over a broker.
    pub fn new(broker: Arc<dyn EventBroker>, metrics: Arc<RealtimeMetrics>) -> Self {
        let channels = Arc::new(ChannelRegistry::new(
            Arc::clone(&broker),
            Arc::clone(&metrics),
        ));
        info!(broker = ?broker, "Real-time hub initialized");
        Self {
            channels,
            presence: Arc::new(RoomPresence::new()),
            metrics,
            broker,
        }
    }

    /// Creates a hub over a fresh in-process broker.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBroker::new()), Arc::new(RealtimeMetrics::new()))
    }

    /// Creates a hub over the configured broker backend.
    pub async fn from_config(
        config: &BrokerConfig,
        metrics: Arc<RealtimeMetrics>,
    ) -> RealtimeResult<Self> {
        let broker: Arc<dyn EventBroker> = match config.backend {
            BrokerBackend::Memory => Arc::new(MemoryBroker::new()),
            #[cfg(feature = "postgres")]
            BrokerBackend::Postgres => {
                Arc::new(crate::broker::PostgresBroker::connect(config).await?)
            }
            #[cfg(not(feature = "postgres"))]
            BrokerBackend::Postgres => {
                return Err(RealtimeError::Broker(
                    "postgres backend requires the `postgres` feature".into(),
                ));
            }
        };
        Ok(Self::new(broker, metrics))
    }

    /// Registers `callback` for events matching a scope key such as `org:42`.
    pub fn subscribe_to_scope<F>(
        &self,
        scope_key: &str,
        callback: F,
    ) -> RealtimeResult<Subscription>
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.channels.subscribe_to_scope(scope_key, callback)
    }

    /// Typed form of [`RealtimeHub::subscribe_to_scope`].
    pub fn subscribe_to<F>(&self, scope: &ScopeKey, callback: F) -> RealtimeResult<Subscription>
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.channels.subscribe_to_scope(&scope.to_channel_name(), callback)
    }

    /// Registers `callback` on every scope in `scopes`.
    ///
    /// All keys are validated before anything is subscribed, so an invalid
    /// key leaves the hub untouched.
    pub fn watch_scopes<F>(
        &self,
        scopes: &[String],
        callback: F,
    ) -> RealtimeResult<Vec<Subscription>>
    where
        F: Fn(&ScopeKey, &Event) + Send + Sync + 'static,
    {
        let keys = scopes
            .iter()
            .map(|scope| {
                ScopeKey::parse(scope).ok_or_else(|| RealtimeError::InvalidScope(scope.clone()))
            })
            .collect::<RealtimeResult<Vec<_>>>()?;

        let callback = Arc::new(callback);
        let mut subscriptions = Vec::with_capacity(keys.len());
        for key in keys {
            let callback = Arc::clone(&callback);
            let name = key.to_channel_name();
            let subscription =
                self.subscribe_to_scope(&name, move |event| callback(&key, event))?;
            subscriptions.push(subscription);
        }
        Ok(subscriptions)
    }

    /// Events for an organization, limited to `kinds` (empty for all).
    pub fn subscribe_to_organization<F>(
        &self,
        organization_id: &str,
        kinds: &[EventKind],
        callback: F,
    ) -> RealtimeResult<Subscription>
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let scope = ScopeKey::Organization(organization_id.to_string());
        self.channels.subscribe_to_scope_kinds(&scope.to_channel_name(), kinds, callback)
    }

    /// Events for a user, limited to `kinds` (empty for all).
    pub fn subscribe_to_user<F>(
        &self,
        user_id: &str,
        kinds: &[EventKind],
        callback: F,
    ) -> RealtimeResult<Subscription>
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let scope = ScopeKey::User(user_id.to_string());
        self.channels.subscribe_to_scope_kinds(&scope.to_channel_name(), kinds, callback)
    }

    /// Dashboard updates for an organization.
    pub fn on_dashboard_update<F>(
        &self,
        organization_id: &str,
        callback: F,
    ) -> RealtimeResult<Subscription>
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.subscribe_to_organization(organization_id, &[EventKind::DashboardUpdate], callback)
    }

    /// Team activity for an organization.
    pub fn on_team_activity<F>(
        &self,
        organization_id: &str,
        callback: F,
    ) -> RealtimeResult<Subscription>
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.subscribe_to_organization(organization_id, &[EventKind::TeamActivity], callback)
    }

    /// Market intelligence for an organization.
    pub fn on_market_intelligence<F>(
        &self,
        organization_id: &str,
        callback: F,
    ) -> RealtimeResult<Subscription>
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.subscribe_to_organization(
            organization_id,
            &[EventKind::MarketIntelligence],
            callback,
        )
    }

    /// Durably publishes an event; matching listeners are reached through
    /// the broker.
    pub async fn publish_event(&self, event: &Event) -> RealtimeResult<()> {
        self.channels.publish_event(event).await
    }

    /// Typed publish helpers.
    pub fn publisher(&self) -> &EventPublisher {
        self.channels.publisher()
    }

    /// Registers a listener for a room's participant list.
    pub fn on_presence_change<F>(&self, room: &str, handler: F) -> Subscription
    where
        F: Fn(&Participants) + Send + Sync + 'static,
    {
        self.presence.on_presence_change(room, handler)
    }

    /// Adds a participant to a room.
    pub fn join_room(&self, room: &str, participant_id: &str) -> bool {
        self.presence.join(room, participant_id)
    }

    /// Removes a participant from a room.
    pub fn leave_room(&self, room: &str, participant_id: &str) -> bool {
        self.presence.leave(room, participant_id)
    }

    /// Tears down every channel and releases the broker.
    pub async fn shutdown(&self) {
        info!(
            channels = self.channels.channel_count(),
            "Shutting down real-time hub"
        );
        self.channels.clear();
        self.broker.shutdown().await;
    }
}
