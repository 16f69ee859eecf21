//! Connection state and status notifications.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Lifecycle state of the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No transport; `connect()` required.
    Disconnected,
    /// First open in flight.
    Connecting,
    /// Transport open; `send()` allowed.
    Connected,
    /// Lost uncleanly; a reconnect is scheduled or in flight.
    Reconnecting,
}

impl ConnectionState {
    /// Converts to string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification delivered to connection-status observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// The transport opened.
    Connected,
    /// The transport closed, cleanly or not.
    Disconnected,
    /// The transport failed.
    Error(String),
    /// A reconnect was scheduled.
    Reconnecting {
        /// 1-based attempt number.
        attempt: u32,
        /// Delay before the attempt.
        delay: Duration,
    },
    /// Reconnect attempts were exhausted; the connection is terminally
    /// disconnected until `connect()` is called again.
    GaveUp {
        /// Attempts made.
        attempts: u32,
    },
}
