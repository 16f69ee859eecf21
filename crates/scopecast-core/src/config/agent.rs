//! Agent binary configuration.

use serde::{Deserialize, Serialize};

/// What the agent listens to on the event hub.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Scope keys (`user:<id>`, `org:<id>`, `room:<name>`) whose events are logged.
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Collaboration rooms whose participant changes are logged.
    #[serde(default)]
    pub rooms: Vec<String>,
}
