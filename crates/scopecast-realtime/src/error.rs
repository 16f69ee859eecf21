//! Error taxonomy of the real-time layer.

use thiserror::Error;

use scopecast_core::error::{AppError, ErrorKind};

/// Errors surfaced by the connection manager, channel registry and brokers.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// `send()` was called while the connection was not `Connected`.
    #[error("real-time connection is not connected")]
    NotConnected,

    /// `connect()` was called while another attempt was in flight.
    #[error("connection attempt already in progress")]
    AlreadyConnecting,

    /// The transport failed while connecting or connected.
    #[error("transient connection error: {0}")]
    TransientConnection(String),

    /// Reconnect attempts were exhausted.
    #[error("connection lost after {attempts} reconnect attempts")]
    TerminalConnection {
        /// Number of reconnect attempts made.
        attempts: u32,
    },

    /// An inbound payload could not be decoded.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// A scope key is not `user:<id>`, `org:<id>` or `room:<name>`.
    #[error("invalid scope key: {0:?}")]
    InvalidScope(String),

    /// The durable write behind `publish_event` failed.
    #[error("failed to publish event: {0}")]
    PublishFailure(String),

    /// The broker could not create or tear down a subscription.
    #[error("broker error: {0}")]
    Broker(String),

    /// JSON encoding failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RealtimeError {
    /// Whether the reconnect schedule should handle this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientConnection(_))
    }
}

/// Result alias for the real-time layer.
pub type RealtimeResult<T> = Result<T, RealtimeError>;

impl From<RealtimeError> for AppError {
    fn from(err: RealtimeError) -> Self {
        let kind = match &err {
            RealtimeError::NotConnected
            | RealtimeError::AlreadyConnecting
            | RealtimeError::TransientConnection(_)
            | RealtimeError::TerminalConnection { .. } => ErrorKind::Connection,
            RealtimeError::MalformedMessage(_) | RealtimeError::InvalidScope(_) => {
                ErrorKind::Validation
            }
            RealtimeError::PublishFailure(_) | RealtimeError::Broker(_) => ErrorKind::Broker,
            RealtimeError::Serialization(_) => ErrorKind::Serialization,
        };
        let message = err.to_string();
        AppError::with_source(kind, message, err)
    }
}
