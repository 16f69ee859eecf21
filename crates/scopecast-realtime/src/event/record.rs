//! Durable event record — the row shape written by publishers and carried
//! back by change notifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RealtimeError, RealtimeResult};

use super::scope::ScopeKey;
use super::types::{Event, ScopeAttributes};

/// Row of the `realtime_events` store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Event kind string.
    pub event_type: String,
    /// Target user, if any.
    pub user_id: Option<String>,
    /// Target organization, if any.
    pub organization_id: Option<String>,
    /// Target room, if any.
    #[serde(default)]
    pub room: Option<String>,
    /// Opaque payload.
    pub payload: serde_json::Value,
    /// Insert time.
    pub created_at: DateTime<Utc>,
}

impl EventRecord {
    /// Encodes an event into its durable row.
    pub fn from_event(event: &Event) -> Self {
        let attrs = &event.scope_attributes;
        Self {
            event_type: event.kind.as_str().to_string(),
            user_id: attrs.user_id.clone(),
            organization_id: attrs.organization_id.clone(),
            room: attrs.room.clone(),
            payload: event.payload.clone(),
            created_at: event.created_at,
        }
    }

    /// Decodes the row back into an event.
    pub fn into_event(self) -> Event {
        Event {
            kind: self.event_type.into(),
            scope_attributes: ScopeAttributes {
                user_id: self.user_id,
                organization_id: self.organization_id,
                room: self.room,
            },
            payload: self.payload,
            created_at: self.created_at,
        }
    }

    /// Topics this record is announced on.
    pub fn scope_keys(&self) -> Vec<ScopeKey> {
        ScopeAttributes {
            user_id: self.user_id.clone(),
            organization_id: self.organization_id.clone(),
            room: self.room.clone(),
        }
        .scope_keys()
    }

    /// Encodes the row as the raw change payload brokers hand to sinks.
    pub fn to_change(&self) -> RealtimeResult<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Decodes a raw change payload into an [`Event`].
    pub fn decode_change(raw: &serde_json::Value) -> RealtimeResult<Event> {
        let record: EventRecord = serde_json::from_value(raw.clone())
            .map_err(|e| RealtimeError::MalformedMessage(format!("invalid event record: {e}")))?;
        if record.event_type.is_empty() {
            return Err(RealtimeError::MalformedMessage(
                "event record has empty event_type".to_string(),
            ));
        }
        Ok(record.into_event())
    }
}
