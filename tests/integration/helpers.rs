//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{Notify, mpsc};
use tokio::time::Instant;

use scopecast_core::config::realtime::RealtimeConfig;
use scopecast_realtime::connection::{
    ConnectionStatus, Connector, TransportCommand, TransportEvent, TransportLink,
};
use scopecast_realtime::error::{RealtimeError, RealtimeResult};
use scopecast_realtime::metrics::RealtimeMetrics;
use scopecast_realtime::ConnectionManager;

/// What the next `open()` does.
#[derive(Debug)]
pub enum Step {
    /// Open immediately.
    Accept,
    /// Fail with a transient error.
    Refuse,
    /// Wait for the notify, then open.
    Hold(Arc<Notify>),
}

/// Server side of one accepted transport.
#[derive(Debug)]
pub struct Peer {
    /// Commands the client sent.
    pub from_client: mpsc::UnboundedReceiver<TransportCommand>,
    /// Events pushed to the client.
    pub to_client: mpsc::UnboundedSender<TransportEvent>,
}

impl Peer {
    /// Pushes one raw inbound frame.
    pub fn push(&self, raw: &str) {
        self.to_client
            .send(TransportEvent::Message(raw.to_string()))
            .expect("client reader gone");
    }

    /// Drops the transport uncleanly.
    pub fn drop_uncleanly(&self) {
        let _ = self.to_client.send(TransportEvent::Closed { clean: false });
    }

    /// Next text frame sent by the client, parsed.
    pub async fn next_sent(&mut self) -> serde_json::Value {
        match self.from_client.recv().await {
            Some(TransportCommand::Send(raw)) => {
                serde_json::from_str(&raw).expect("client sent invalid JSON")
            }
            other => panic!("expected a sent frame, got {other:?}"),
        }
    }
}

/// Connector driven by a script; unscripted opens are refused.
#[derive(Debug, Default)]
pub struct ScriptedConnector {
    script: Mutex<VecDeque<Step>>,
    peers: Mutex<VecDeque<Peer>>,
    opens: Mutex<Vec<Instant>>,
}

impl ScriptedConnector {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(steps.into_iter().collect()),
            ..Default::default()
        })
    }

    pub fn push_step(&self, step: Step) {
        self.script.lock().unwrap().push_back(step);
    }

    /// Oldest unclaimed accepted transport.
    pub fn take_peer(&self) -> Peer {
        self.peers.lock().unwrap().pop_front().expect("no accepted transport")
    }

    /// Instants at which `open()` was called.
    pub fn opens(&self) -> Vec<Instant> {
        self.opens.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn open(&self) -> RealtimeResult<TransportLink> {
        self.opens.lock().unwrap().push(Instant::now());
        let step = self.script.lock().unwrap().pop_front().unwrap_or(Step::Refuse);
        match step {
            Step::Refuse => {
                return Err(RealtimeError::TransientConnection("connection refused".into()));
            }
            Step::Hold(gate) => gate.notified().await,
            Step::Accept => {}
        }

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        self.peers.lock().unwrap().push_back(Peer {
            from_client: out_rx,
            to_client: in_tx,
        });
        Ok(TransportLink {
            outbound: out_tx,
            inbound: in_rx,
        })
    }
}

/// Config with the default schedule (1s base, 5 attempts).
pub fn test_config() -> RealtimeConfig {
    RealtimeConfig::default()
}

/// Manager over a scripted connector.
pub fn manager(connector: Arc<ScriptedConnector>) -> (ConnectionManager, Arc<RealtimeMetrics>) {
    let metrics = Arc::new(RealtimeMetrics::new());
    (ConnectionManager::new(&test_config(), connector, metrics.clone()), metrics)
}

/// Records every status notification.
pub fn record_statuses(manager: &ConnectionManager) -> Arc<Mutex<Vec<ConnectionStatus>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    // Kept registered for the whole test.
    let _ = manager.on_connection_change(move |s| sink.lock().unwrap().push(s.clone()));
    seen
}

/// Lets spawned tasks run without advancing time.
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
