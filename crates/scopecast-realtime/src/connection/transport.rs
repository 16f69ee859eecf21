//! Transport abstraction between the connection manager and a socket.

use std::fmt;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::RealtimeResult;

/// Command from the manager to an open transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCommand {
    /// Write one text frame.
    Send(String),
    /// Close cleanly (code 1000) and stop.
    Close,
}

/// Event from an open transport to the manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// One inbound text frame.
    Message(String),
    /// The socket closed; `clean` when the close handshake carried code 1000.
    Closed {
        /// Whether the close was clean.
        clean: bool,
    },
    /// The socket failed.
    Error(String),
}

/// Channel pair of an open transport.
#[derive(Debug)]
pub struct TransportLink {
    /// Commands to the socket.
    pub outbound: mpsc::UnboundedSender<TransportCommand>,
    /// Events from the socket.
    pub inbound: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Opens transports.
///
/// `open` resolves once the transport reports "open" and fails with
/// `RealtimeError::TransientConnection` otherwise.
#[async_trait]
pub trait Connector: Send + Sync + fmt::Debug {
    /// Opens one transport.
    async fn open(&self) -> RealtimeResult<TransportLink>;
}
