//! WebSocket transport over `tokio-tungstenite`.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::{debug, warn};

use scopecast_core::config::realtime::RealtimeConfig;

use crate::error::{RealtimeError, RealtimeResult};

use super::transport::{Connector, TransportCommand, TransportEvent, TransportLink};

/// Opens WebSocket connections to a fixed endpoint.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    url: String,
    token: Option<String>,
}

impl WebSocketConnector {
    /// Creates a connector; `token` is passed as the `token` query parameter.
    pub fn new(url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            url: url.into(),
            token,
        }
    }

    /// Builds a connector from configuration.
    pub fn from_config(config: &RealtimeConfig) -> Self {
        Self::new(config.url.clone(), config.token.clone())
    }

    /// The URL actually dialed.
    pub fn endpoint(&self) -> String {
        match &self.token {
            Some(token) => {
                let separator = if self.url.contains('?') { '&' } else { '?' };
                format!("{}{}token={}", self.url, separator, token)
            }
            None => self.url.clone(),
        }
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn open(&self) -> RealtimeResult<TransportLink> {
        let (ws, _) = connect_async(self.endpoint())
            .await
            .map_err(|e| RealtimeError::TransientConnection(format!("WebSocket connect: {e}")))?;
        debug!(url = %self.url, "WebSocket opened");

        let (mut ws_tx, mut ws_rx) = ws.split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<TransportCommand>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<TransportEvent>();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    cmd = out_rx.recv() => match cmd {
                        Some(TransportCommand::Send(text)) => {
                            if let Err(e) = ws_tx.send(Message::Text(text.into())).await {
                                let _ = in_tx.send(TransportEvent::Error(e.to_string()));
                                break;
                            }
                        }
                        Some(TransportCommand::Close) | None => {
                            let frame = CloseFrame {
                                code: CloseCode::Normal,
                                reason: "client disconnect".into(),
                            };
                            let _ = ws_tx.send(Message::Close(Some(frame))).await;
                            let _ = ws_tx.close().await;
                            let _ = in_tx.send(TransportEvent::Closed { clean: true });
                            break;
                        }
                    },
                    frame = ws_rx.next() => match frame {
                        Some(Ok(Message::Text(text))) => {
                            let _ = in_tx.send(TransportEvent::Message(text.to_string()));
                        }
                        Some(Ok(Message::Binary(bytes))) => {
                            match String::from_utf8(bytes.to_vec()) {
                                Ok(text) => {
                                    let _ = in_tx.send(TransportEvent::Message(text));
                                }
                                Err(_) => warn!("Dropping non-UTF-8 binary frame"),
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let clean = frame.is_some_and(|f| f.code == CloseCode::Normal);
                            let _ = in_tx.send(TransportEvent::Closed { clean });
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            let _ = in_tx.send(TransportEvent::Error(e.to_string()));
                            break;
                        }
                        None => {
                            let _ = in_tx.send(TransportEvent::Closed { clean: false });
                            break;
                        }
                    },
                }
            }
            debug!("WebSocket pump stopped");
        });

        Ok(TransportLink {
            outbound: out_tx,
            inbound: in_rx,
        })
    }
}
