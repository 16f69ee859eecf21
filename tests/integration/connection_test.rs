//! Integration tests for the connection manager lifecycle and dispatch.

mod helpers;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use tokio::sync::Notify;
use tokio::time::Instant;

use helpers::{ScriptedConnector, Step, settle};
use scopecast_realtime::error::RealtimeError;
use scopecast_realtime::message::OutgoingMessage;
use scopecast_realtime::{ConnectionState, ConnectionStatus, MessageType};

fn notification(id: &str) -> String {
    json!({
        "id": id,
        "type": "notification",
        "data": {"title": "Report ready"},
        "timestamp": "2026-05-04T08:15:00Z"
    })
    .to_string()
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_schedule_doubles_and_gives_up() {
    let connector = ScriptedConnector::new([Step::Accept]);
    let (manager, metrics) = helpers::manager(connector.clone());
    let statuses = helpers::record_statuses(&manager);

    manager.connect().await.unwrap();
    let peer = connector.take_peer();

    let lost_at = Instant::now();
    peer.drop_uncleanly();
    tokio::time::sleep(Duration::from_secs(120)).await;

    let opens = connector.opens();
    assert_eq!(opens.len(), 6, "initial open plus five reconnects");
    let offsets: Vec<u64> = opens[1..].iter().map(|t| (*t - lost_at).as_secs()).collect();
    assert_eq!(offsets, vec![1, 3, 7, 15, 31]);

    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert_eq!(manager.reconnect_attempts(), 5);
    assert_eq!(metrics.snapshot().reconnect_attempts, 5);

    let statuses = statuses.lock().unwrap().clone();
    let delays: Vec<Duration> = statuses
        .iter()
        .filter_map(|s| match s {
            ConnectionStatus::Reconnecting { delay, .. } => Some(*delay),
            _ => None,
        })
        .collect();
    assert_eq!(
        delays,
        [1, 2, 4, 8, 16].map(Duration::from_secs).to_vec()
    );
    assert_eq!(statuses.last(), Some(&ConnectionStatus::GaveUp { attempts: 5 }));

    // No timer survives giving up.
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(connector.opens().len(), 6);
}

#[tokio::test(start_paused = true)]
async fn test_successful_reconnect_resets_attempts_and_keeps_handlers() {
    let connector = ScriptedConnector::new([Step::Accept, Step::Refuse, Step::Accept]);
    let (manager, _metrics) = helpers::manager(connector.clone());
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    manager.subscribe_to_type(MessageType::Notification, move |m| {
        sink.lock().unwrap().push(m.id.clone())
    });

    manager.connect().await.unwrap();
    connector.take_peer().drop_uncleanly();
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(manager.state(), ConnectionState::Connected);
    assert_eq!(manager.reconnect_attempts(), 0);
    assert_eq!(connector.opens().len(), 3);

    let peer = connector.take_peer();
    peer.push(&notification("n-after-reconnect"));
    settle().await;
    assert_eq!(*received.lock().unwrap(), vec!["n-after-reconnect"]);
}

#[tokio::test(start_paused = true)]
async fn test_clean_close_does_not_reconnect() {
    let connector = ScriptedConnector::new([Step::Accept]);
    let (manager, _metrics) = helpers::manager(connector.clone());
    let statuses = helpers::record_statuses(&manager);

    manager.connect().await.unwrap();
    let peer = connector.take_peer();
    let _ = peer
        .to_client
        .send(scopecast_realtime::connection::TransportEvent::Closed { clean: true });
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert_eq!(connector.opens().len(), 1);
    assert_eq!(
        *statuses.lock().unwrap(),
        vec![ConnectionStatus::Connected, ConnectionStatus::Disconnected]
    );
}

#[tokio::test(start_paused = true)]
async fn test_send_requires_connected_state() {
    let gate = Arc::new(Notify::new());
    let connector = ScriptedConnector::new([Step::Hold(gate.clone())]);
    let (manager, metrics) = helpers::manager(connector.clone());
    let draft = || {
        OutgoingMessage::new(MessageType::Chat, json!({"content": "hi"})).with_room("general")
    };

    assert!(matches!(manager.send(draft()), Err(RealtimeError::NotConnected)));

    let connecting = manager.clone();
    let task = tokio::spawn(async move { connecting.connect().await });
    settle().await;

    assert_eq!(manager.state(), ConnectionState::Connecting);
    assert!(matches!(manager.send(draft()), Err(RealtimeError::NotConnected)));
    assert!(matches!(manager.connect().await, Err(RealtimeError::AlreadyConnecting)));

    gate.notify_one();
    task.await.unwrap().unwrap();
    assert_eq!(manager.state(), ConnectionState::Connected);

    let mut peer = connector.take_peer();
    let sent = manager.send(draft()).unwrap();
    let wire = peer.next_sent().await;
    assert_eq!(wire["id"], sent.id.as_str());
    assert_eq!(wire["type"], "chat");
    assert_eq!(wire["room"], "general");
    assert!(wire["timestamp"].is_string());
    assert_eq!(metrics.snapshot().messages_sent, 1);

    peer.drop_uncleanly();
    settle().await;
    assert_eq!(manager.state(), ConnectionState::Reconnecting);
    assert!(matches!(manager.send(draft()), Err(RealtimeError::NotConnected)));
}

#[tokio::test(start_paused = true)]
async fn test_dropped_connect_future_releases_attempt() {
    let gate = Arc::new(Notify::new());
    let connector = ScriptedConnector::new([Step::Hold(gate), Step::Accept]);
    let (manager, _metrics) = helpers::manager(connector.clone());

    let timed_out = tokio::time::timeout(Duration::from_secs(5), manager.connect()).await;
    assert!(timed_out.is_err());
    assert_eq!(manager.state(), ConnectionState::Disconnected);

    manager.connect().await.unwrap();
    assert_eq!(manager.state(), ConnectionState::Connected);
    assert_eq!(connector.opens().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_cancels_pending_reconnect() {
    let connector = ScriptedConnector::new([Step::Accept]);
    let (manager, _metrics) = helpers::manager(connector.clone());
    let statuses = helpers::record_statuses(&manager);

    manager.connect().await.unwrap();
    connector.take_peer().drop_uncleanly();
    settle().await;
    assert_eq!(manager.state(), ConnectionState::Reconnecting);

    manager.disconnect();
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert_eq!(connector.opens().len(), 1);
    assert_eq!(statuses.lock().unwrap().last(), Some(&ConnectionStatus::Disconnected));
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_closes_transport_cleanly() {
    let connector = ScriptedConnector::new([Step::Accept]);
    let (manager, _metrics) = helpers::manager(connector.clone());

    manager.connect().await.unwrap();
    let mut peer = connector.take_peer();
    manager.disconnect();

    assert_eq!(
        peer.from_client.recv().await,
        Some(scopecast_realtime::connection::TransportCommand::Close)
    );
    assert!(matches!(
        manager.send(OutgoingMessage::new(MessageType::Update, json!({}))),
        Err(RealtimeError::NotConnected)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_initial_failure_rejects_without_retry() {
    let connector = ScriptedConnector::new([Step::Refuse]);
    let (manager, _metrics) = helpers::manager(connector.clone());
    let statuses = helpers::record_statuses(&manager);

    let err = manager.connect().await.unwrap_err();
    assert!(err.is_transient());
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert_eq!(connector.opens().len(), 1);
    assert!(matches!(
        statuses.lock().unwrap().as_slice(),
        [ConnectionStatus::Error(_)]
    ));
}

#[tokio::test]
async fn test_connect_while_connected_is_a_noop() {
    let connector = ScriptedConnector::new([Step::Accept]);
    let (manager, _metrics) = helpers::manager(connector.clone());

    manager.connect().await.unwrap();
    manager.connect().await.unwrap();
    assert_eq!(connector.opens().len(), 1);
}

#[tokio::test]
async fn test_dispatch_drops_malformed_and_isolates_panics() {
    let connector = ScriptedConnector::new([Step::Accept]);
    let (manager, metrics) = helpers::manager(connector.clone());
    let hits = Arc::new(Mutex::new(Vec::new()));

    manager.subscribe_to_type(MessageType::Notification, |_| panic!("renderer bug"));
    let sink = hits.clone();
    let second = manager.subscribe_to_type(MessageType::Notification, move |m| {
        sink.lock().unwrap().push(m.id.clone())
    });

    manager.connect().await.unwrap();
    let peer = connector.take_peer();
    peer.push("not json");
    peer.push(r#"{"id":"x","type":"telepathy","data":{},"timestamp":"2026-05-04T08:15:00Z"}"#);
    peer.push(&notification("n1"));
    settle().await;

    assert_eq!(*hits.lock().unwrap(), vec!["n1"]);
    assert_eq!(manager.state(), ConnectionState::Connected);
    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.malformed_dropped, 2);
    assert_eq!(snapshot.messages_received, 1);
    assert_eq!(snapshot.listener_panics, 1);

    assert!(manager.remove_handler(second));
    manager.unsubscribe_from_type(MessageType::Notification);
    assert_eq!(manager.handler_count(MessageType::Notification), 0);
    peer.push(&notification("n2"));
    settle().await;
    assert_eq!(hits.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_room_control_messages() {
    let connector = ScriptedConnector::new([Step::Accept]);
    let (manager, _metrics) = helpers::manager(connector.clone());

    manager.connect().await.unwrap();
    let mut peer = connector.take_peer();
    manager.join_room("strategy").unwrap();
    manager.leave_room("strategy").unwrap();

    let join = peer.next_sent().await;
    assert_eq!(join["type"], "update");
    assert_eq!(join["data"], json!({"action": "join_room", "room": "strategy"}));
    let leave = peer.next_sent().await;
    assert_eq!(leave["data"]["action"], "leave_room");
}
