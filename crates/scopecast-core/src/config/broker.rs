//! Event broker configuration.

use serde::{Deserialize, Serialize};

/// Which broker implementation backs the channel registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrokerBackend {
    /// In-process broker; events live only as long as the process.
    #[default]
    Memory,
    /// PostgreSQL table with `LISTEN`/`NOTIFY` change notifications.
    Postgres,
}

/// Event broker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Backend selection.
    #[serde(default)]
    pub backend: BrokerBackend,
    /// PostgreSQL connection URL, required for the `postgres` backend.
    #[serde(default)]
    pub database_url: Option<String>,
    /// Maximum pooled database connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            backend: BrokerBackend::default(),
            database_url: None,
            max_connections: default_max_connections(),
        }
    }
}

fn default_max_connections() -> u32 {
    5
}
