//! Integration tests for the WebSocket transport against a local server.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

use scopecast_core::config::realtime::RealtimeConfig;
use scopecast_realtime::message::OutgoingMessage;
use scopecast_realtime::metrics::RealtimeMetrics;
use scopecast_realtime::{ConnectionManager, ConnectionState, ConnectionStatus, MessageType};

const TIMEOUT: Duration = Duration::from_secs(5);

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/ws", listener.local_addr().unwrap());
    (listener, url)
}

#[tokio::test]
async fn test_round_trip_and_clean_close() {
    let (listener, url) = bind().await;

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        let frame = ws.next().await.unwrap().unwrap();
        let sent: Value = serde_json::from_str(frame.to_text().unwrap()).unwrap();
        let reply = json!({
            "id": "srv-1",
            "type": "notification",
            "data": {"echo": sent["id"], "content": sent["data"]["content"]},
            "timestamp": "2026-05-04T08:15:00Z"
        });
        ws.send(Message::Text(reply.to_string().into())).await.unwrap();

        loop {
            match ws.next().await {
                Some(Ok(Message::Close(frame))) => return frame.map(|f| f.code),
                Some(Ok(_)) => continue,
                _ => return None,
            }
        }
    });

    let config = RealtimeConfig {
        url,
        ..Default::default()
    };
    let manager = ConnectionManager::websocket(&config, Arc::new(RealtimeMetrics::new()));
    let (tx, mut rx) = mpsc::unbounded_channel();
    manager.subscribe_to_type(MessageType::Notification, move |m| {
        let _ = tx.send(m.clone());
    });

    manager.connect().await.unwrap();
    assert_eq!(manager.state(), ConnectionState::Connected);

    let sent = manager
        .send(
            OutgoingMessage::new(MessageType::Chat, json!({"content": "hello"}))
                .with_room("general"),
        )
        .unwrap();

    let received = tokio::time::timeout(TIMEOUT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(received.id, "srv-1");
    assert_eq!(received.data["echo"], sent.id.as_str());
    assert_eq!(received.data["content"], "hello");

    manager.disconnect();
    let code = tokio::time::timeout(TIMEOUT, server).await.unwrap().unwrap();
    assert_eq!(code, Some(CloseCode::Normal));
    assert_eq!(manager.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_server_going_away_triggers_reconnect() {
    let (listener, url) = bind().await;

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let frame = CloseFrame {
            code: CloseCode::Away,
            reason: "restarting".into(),
        };
        let _ = ws.send(Message::Close(Some(frame))).await;
        while let Some(Ok(_)) = ws.next().await {}

        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        while let Some(Ok(_)) = ws.next().await {}
    });

    let config = RealtimeConfig {
        url,
        reconnect_base_delay_ms: 20,
        max_reconnect_attempts: 3,
        ..Default::default()
    };
    let manager = ConnectionManager::websocket(&config, Arc::new(RealtimeMetrics::new()));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _status = manager.on_connection_change(move |s| {
        let _ = tx.send(s.clone());
    });

    manager.connect().await.unwrap();

    let mut seen = Vec::new();
    while seen.iter().filter(|s| **s == ConnectionStatus::Connected).count() < 2 {
        let status = tokio::time::timeout(TIMEOUT, rx.recv()).await.unwrap().unwrap();
        seen.push(status);
    }
    assert!(seen.contains(&ConnectionStatus::Reconnecting {
        attempt: 1,
        delay: Duration::from_millis(20),
    }));
    assert_eq!(manager.state(), ConnectionState::Connected);
    assert_eq!(manager.reconnect_attempts(), 0);

    manager.disconnect();
    let _ = tokio::time::timeout(TIMEOUT, server).await;
}
