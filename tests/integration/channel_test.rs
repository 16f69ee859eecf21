//! Integration tests for scope channels, publishing and presence through the hub.

use std::sync::{Arc, Mutex};

use serde_json::json;

use scopecast_realtime::broker::{EventBroker, MemoryBroker};
use scopecast_realtime::error::RealtimeError;
use scopecast_realtime::metrics::RealtimeMetrics;
use scopecast_realtime::{Event, EventKind, RealtimeHub, ScopeAttributes};

fn hub() -> (RealtimeHub, Arc<MemoryBroker>) {
    let broker = Arc::new(MemoryBroker::recording());
    let hub = RealtimeHub::new(broker.clone(), Arc::new(RealtimeMetrics::new()));
    (hub, broker)
}

#[tokio::test]
async fn test_dashboard_update_reaches_org_subscriber() {
    let (hub, broker) = hub();
    let seen: Arc<Mutex<Vec<Event>>> = Arc::default();
    let sink = seen.clone();
    let sub = hub
        .subscribe_to_scope("org:42", move |e| sink.lock().unwrap().push(e.clone()))
        .unwrap();

    hub.publish_event(&Event::new(
        EventKind::DashboardUpdate,
        ScopeAttributes::organization("42"),
        json!({"overallScore": 81}),
    ))
    .await
    .unwrap();

    {
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].kind, EventKind::DashboardUpdate);
        assert_eq!(seen[0].payload, json!({"overallScore": 81}));
    }

    sub.unsubscribe();
    assert!(!hub.channels.has_channel("org:42"));
    assert_eq!(broker.subscription_count("org:42"), 0);

    hub.publish_event(&Event::new(
        EventKind::DashboardUpdate,
        ScopeAttributes::organization("42"),
        json!({"overallScore": 90}),
    ))
    .await
    .unwrap();
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_event_matching_two_scopes_reaches_each_once() {
    let (hub, _broker) = hub();
    let log: Arc<Mutex<Vec<&'static str>>> = Arc::default();

    let user_log = log.clone();
    let _user = hub
        .subscribe_to_scope("user:u1", move |_| user_log.lock().unwrap().push("user"))
        .unwrap();
    let org_log = log.clone();
    let _org = hub
        .subscribe_to_scope("org:o1", move |_| org_log.lock().unwrap().push("org"))
        .unwrap();
    let other_log = log.clone();
    let _other = hub
        .subscribe_to_scope("org:o2", move |_| other_log.lock().unwrap().push("other"))
        .unwrap();

    hub.publisher()
        .publish_team_activity("u1", "o1", json!({"action": "completed_assessment"}))
        .await
        .unwrap();

    assert_eq!(*log.lock().unwrap(), vec!["user", "org"]);
}

#[tokio::test]
async fn test_channel_exists_only_while_listened() {
    let (hub, broker) = hub();
    let subs: Vec<_> = (0..3)
        .map(|_| hub.subscribe_to_scope("room:design", |_| {}).unwrap())
        .collect();
    assert_eq!(hub.channels.listener_count("room:design"), 3);
    assert_eq!(broker.subscription_count("room:design"), 1);

    for (i, sub) in subs.iter().enumerate() {
        sub.unsubscribe();
        let remaining = 2 - i;
        assert_eq!(hub.channels.has_channel("room:design"), remaining > 0);
        assert_eq!(broker.subscription_count("room:design"), usize::from(remaining > 0));
    }

    // Re-subscribing after teardown creates a fresh channel.
    let _again = hub.subscribe_to_scope("room:design", |_| {}).unwrap();
    assert_eq!(broker.subscription_count("room:design"), 1);
}

#[tokio::test]
async fn test_per_scope_delivery_follows_publish_order() {
    let (hub, _broker) = hub();
    let order: Arc<Mutex<Vec<i64>>> = Arc::default();
    let sink = order.clone();
    let _sub = hub
        .subscribe_to_scope("user:u7", move |e| {
            sink.lock().unwrap().push(e.payload["seq"].as_i64().unwrap_or(-1))
        })
        .unwrap();

    for seq in 0..20 {
        hub.publish_event(&Event::new(
            "notification",
            ScopeAttributes::user("u7"),
            json!({"seq": seq}),
        ))
        .await
        .unwrap();
    }

    assert_eq!(*order.lock().unwrap(), (0..20).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_failed_publish_delivers_nothing() {
    let (hub, broker) = hub();
    let hits: Arc<Mutex<usize>> = Arc::default();
    let counter = hits.clone();
    let _sub = hub
        .subscribe_to_scope("org:42", move |_| *counter.lock().unwrap() += 1)
        .unwrap();

    broker.fail_next_publish("insert rejected");
    let err = hub
        .publish_event(&Event::new(
            "dashboard_update",
            ScopeAttributes::organization("42"),
            json!({}),
        ))
        .await
        .unwrap_err();

    assert!(matches!(err, RealtimeError::PublishFailure(_)));
    assert_eq!(*hits.lock().unwrap(), 0);
    assert!(broker.records().await.is_empty());
    assert_eq!(hub.metrics.snapshot().publish_failures, 1);
}

#[tokio::test]
async fn test_presence_join_is_idempotent() {
    let (hub, _broker) = hub();
    let broadcasts: Arc<Mutex<Vec<Vec<String>>>> = Arc::default();
    let sink = broadcasts.clone();
    let _sub = hub.on_presence_change("strategy", move |p| sink.lock().unwrap().push(p.clone()));

    assert!(hub.join_room("strategy", "p1"));
    assert!(!hub.join_room("strategy", "p1"));
    assert!(hub.join_room("strategy", "p2"));
    assert!(hub.leave_room("strategy", "p1"));

    assert_eq!(
        *broadcasts.lock().unwrap(),
        vec![
            vec!["p1".to_string()],
            vec!["p1".to_string(), "p2".to_string()],
            vec!["p2".to_string()],
        ]
    );
}

#[tokio::test]
async fn test_typed_org_helpers_filter_by_kind() {
    let (hub, broker) = hub();
    let dashboards: Arc<Mutex<Vec<serde_json::Value>>> = Arc::default();
    let sink = dashboards.clone();
    let _dash = hub
        .on_dashboard_update("42", move |e| sink.lock().unwrap().push(e.payload.clone()))
        .unwrap();
    let activity: Arc<Mutex<usize>> = Arc::default();
    let counter = activity.clone();
    let _team = hub
        .on_team_activity("42", move |_| *counter.lock().unwrap() += 1)
        .unwrap();
    let user_kinds: Arc<Mutex<Vec<EventKind>>> = Arc::default();
    let kinds_sink = user_kinds.clone();
    let _user = hub
        .subscribe_to_user("u1", &[], move |e| kinds_sink.lock().unwrap().push(e.kind.clone()))
        .unwrap();

    assert_eq!(hub.channels.listener_count("org:42"), 2);
    assert_eq!(broker.subscription_count("org:42"), 1);

    let both = ScopeAttributes::organization("42").with_user("u1");
    for (kind, seq) in [
        (EventKind::MarketIntelligence, 1),
        (EventKind::DashboardUpdate, 2),
        (EventKind::TeamActivity, 3),
    ] {
        hub.publish_event(&Event::new(kind, both.clone(), json!({ "seq": seq })))
            .await
            .unwrap();
    }

    assert_eq!(*dashboards.lock().unwrap(), vec![json!({ "seq": 2 })]);
    assert_eq!(*activity.lock().unwrap(), 1);
    assert_eq!(
        *user_kinds.lock().unwrap(),
        vec![
            EventKind::MarketIntelligence,
            EventKind::DashboardUpdate,
            EventKind::TeamActivity
        ]
    );
}
