//! Event type definitions.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::scope::ScopeKey;

/// Event kind carried by every published event.
///
/// Serialized as its snake_case string; unknown strings round-trip
/// through [`EventKind::Custom`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    /// Dashboard metrics changed.
    DashboardUpdate,
    /// A team member did something.
    TeamActivity,
    /// A market trend was detected.
    MarketIntelligence,
    /// An assessment was completed.
    AssessmentCompleted,
    /// A growth lever changed progress or status.
    GrowthLeverUpdated,
    /// A user-facing notification.
    Notification,
    /// Any other kind.
    Custom(String),
}

impl EventKind {
    /// Converts to string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::DashboardUpdate => "dashboard_update",
            Self::TeamActivity => "team_activity",
            Self::MarketIntelligence => "market_intelligence",
            Self::AssessmentCompleted => "assessment_completed",
            Self::GrowthLeverUpdated => "growth_lever_updated",
            Self::Notification => "notification",
            Self::Custom(kind) => kind,
        }
    }
}

impl From<String> for EventKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "dashboard_update" => Self::DashboardUpdate,
            "team_activity" => Self::TeamActivity,
            "market_intelligence" => Self::MarketIntelligence,
            "assessment_completed" => Self::AssessmentCompleted,
            "growth_lever_updated" => Self::GrowthLeverUpdated,
            "notification" => Self::Notification,
            _ => Self::Custom(s),
        }
    }
}

impl From<&str> for EventKind {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::Custom(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audience attributes of an event. Each present attribute selects one scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeAttributes {
    /// Target user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Target organization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    /// Target room.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
}

impl ScopeAttributes {
    /// Attributes addressing a single user.
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::default()
        }
    }

    /// Attributes addressing a single organization.
    pub fn organization(organization_id: impl Into<String>) -> Self {
        Self {
            organization_id: Some(organization_id.into()),
            ..Self::default()
        }
    }

    /// Attributes addressing a room.
    pub fn room(room: impl Into<String>) -> Self {
        Self {
            room: Some(room.into()),
            ..Self::default()
        }
    }

    /// Adds a user attribute.
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Adds an organization attribute.
    pub fn with_organization(mut self, organization_id: impl Into<String>) -> Self {
        self.organization_id = Some(organization_id.into());
        self
    }

    /// Scope keys matched by these attributes, ordered user, organization, room.
    pub fn scope_keys(&self) -> Vec<ScopeKey> {
        let mut keys = Vec::with_capacity(3);
        if let Some(id) = &self.user_id {
            keys.push(ScopeKey::User(id.clone()));
        }
        if let Some(id) = &self.organization_id {
            keys.push(ScopeKey::Organization(id.clone()));
        }
        if let Some(room) = &self.room {
            keys.push(ScopeKey::Room(room.clone()));
        }
        keys
    }
}

/// An immutable typed event moved between producers and subscribers.
///
/// The payload is opaque to the realtime layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Event kind.
    pub kind: EventKind,
    /// Audience attributes.
    pub scope_attributes: ScopeAttributes,
    /// Opaque payload.
    pub payload: serde_json::Value,
    /// Publish time.
    pub created_at: DateTime<Utc>,
}

impl Event {
    /// Creates an event stamped with the current time.
    pub fn new(
        kind: impl Into<EventKind>,
        scope_attributes: ScopeAttributes,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            kind: kind.into(),
            scope_attributes,
            payload,
            created_at: Utc::now(),
        }
    }

    /// Scope keys this event is delivered to.
    pub fn scope_keys(&self) -> Vec<ScopeKey> {
        self.scope_attributes.scope_keys()
    }
}
