//! Event publisher — durable write through the broker.
//!
//! Publishing never fans out directly: listeners are reached only through
//! the broker's change notification, so per-scope delivery order is the
//! store's insertion order. Failed writes are returned to the caller and
//! never retried here.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, error};

use crate::broker::EventBroker;
use crate::error::{RealtimeError, RealtimeResult};
use crate::event::{Event, EventKind, EventRecord, ScopeAttributes};
use crate::metrics::RealtimeMetrics;

/// Encodes events into records and writes them through a broker.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    broker: Arc<dyn EventBroker>,
    metrics: Arc<RealtimeMetrics>,
}

impl EventPublisher {
    /// Creates a publisher over a broker.
    pub fn new(broker: Arc<dyn EventBroker>, metrics: Arc<RealtimeMetrics>) -> Self {
        Self { broker, metrics }
    }

    /// Durably records an event. Resolves once the broker acknowledges.
    pub async fn publish(&self, event: &Event) -> RealtimeResult<()> {
        let record = EventRecord::from_event(event);
        match self.broker.publish(&record).await {
            Ok(()) => {
                self.metrics.event_published();
                debug!(event_type = %record.event_type, "Event published");
                Ok(())
            }
            Err(e) => {
                self.metrics.publish_failed();
                error!(event_type = %record.event_type, error = %e, "Failed to publish event");
                Err(match e {
                    RealtimeError::PublishFailure(reason) => RealtimeError::PublishFailure(reason),
                    other => RealtimeError::PublishFailure(other.to_string()),
                })
            }
        }
    }

    /// Publishes a `dashboard_update` for a user within an organization.
    pub async fn publish_dashboard_update(
        &self,
        user_id: &str,
        organization_id: &str,
        metrics: serde_json::Value,
    ) -> RealtimeResult<()> {
        let event = Event::new(
            EventKind::DashboardUpdate,
            ScopeAttributes::user(user_id).with_organization(organization_id),
            json!({ "metrics": metrics }),
        );
        self.publish(&event).await
    }

    /// Publishes a `team_activity` event.
    pub async fn publish_team_activity(
        &self,
        user_id: &str,
        organization_id: &str,
        activity: serde_json::Value,
    ) -> RealtimeResult<()> {
        let event = Event::new(
            EventKind::TeamActivity,
            ScopeAttributes::user(user_id).with_organization(organization_id),
            json!({ "activity": activity }),
        );
        self.publish(&event).await
    }

    /// Publishes an `assessment_completed` event.
    pub async fn publish_assessment_completed(
        &self,
        user_id: &str,
        organization_id: &str,
        assessment: serde_json::Value,
    ) -> RealtimeResult<()> {
        let event = Event::new(
            EventKind::AssessmentCompleted,
            ScopeAttributes::user(user_id).with_organization(organization_id),
            json!({ "assessment": assessment }),
        );
        self.publish(&event).await
    }
}
