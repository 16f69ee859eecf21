//! Real-time connection configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Client-side real-time connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// WebSocket endpoint URL.
    #[serde(default = "default_url")]
    pub url: String,
    /// Optional access token appended as `?token=`.
    #[serde(default)]
    pub token: Option<String>,
    /// Reconnect attempts after an unclean close before giving up.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    /// Base reconnect delay in milliseconds; doubled on every attempt.
    #[serde(default = "default_reconnect_base_delay")]
    pub reconnect_base_delay_ms: u64,
    /// Largest inbound frame accepted, in bytes.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
}

impl RealtimeConfig {
    /// Base reconnect delay as a [`Duration`].
    pub fn reconnect_base_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_base_delay_ms)
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            token: None,
            max_reconnect_attempts: default_max_reconnect_attempts(),
            reconnect_base_delay_ms: default_reconnect_base_delay(),
            max_message_size: default_max_message_size(),
        }
    }
}

fn default_url() -> String {
    "ws://127.0.0.1:8080/ws".to_string()
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

fn default_reconnect_base_delay() -> u64 {
    1000
}

fn default_max_message_size() -> usize {
    65_536
}
