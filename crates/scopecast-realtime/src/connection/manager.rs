//! Connection manager — owns the socket lifecycle, reconnect schedule and
//! type-keyed dispatch of inbound messages.
//!
//! One manager per client process. It is cheap to clone; clones share the
//! same connection.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use scopecast_core::config::realtime::RealtimeConfig;

use crate::error::{RealtimeError, RealtimeResult};
use crate::listener::{Listener, invoke_isolated};
use crate::message::validator::decode_inbound;
use crate::message::{MessageType, OutgoingMessage, RoomAction, RoomControl, WireMessage};
use crate::metrics::RealtimeMetrics;
use crate::subscription::Subscription;

use super::backoff::ReconnectPolicy;
use super::handlers::{HandlerId, HandlerTable, ObserverSet};
use super::state::{ConnectionState, ConnectionStatus};
use super::transport::{Connector, TransportCommand, TransportEvent};
use super::websocket::WebSocketConnector;

/// Mutable lifecycle data, guarded by one lock.
///
/// `generation` changes on every `connect()` and `disconnect()`; transport
/// events and timers tagged with an older generation are ignored.
#[derive(Debug)]
struct Link {
    state: ConnectionState,
    attempts: u32,
    in_flight: bool,
    generation: u64,
    outbound: Option<mpsc::UnboundedSender<TransportCommand>>,
    reconnect_timer: Option<JoinHandle<()>>,
}

struct Shared {
    connector: Arc<dyn Connector>,
    policy: ReconnectPolicy,
    max_message_size: usize,
    link: Mutex<Link>,
    handlers: HandlerTable,
    observers: ObserverSet,
    metrics: Arc<RealtimeMetrics>,
}

/// Resets the lifecycle if a `connect()` future is dropped mid-open.
struct PendingConnect<'a> {
    manager: &'a ConnectionManager,
    generation: u64,
    armed: bool,
}

impl Drop for PendingConnect<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.manager.abandon(self.generation);
        }
    }
}

/// Client connection to the real-time endpoint.
#[derive(Clone)]
pub struct ConnectionManager {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let link = self.link();
        f.debug_struct("ConnectionManager")
            .field("state", &link.state)
            .field("attempts", &link.attempts)
            .field("connector", &self.shared.connector)
            .finish()
    }
}

impl ConnectionManager {
    /// Creates a manager over any connector.
    pub fn new(
        config: &RealtimeConfig,
        connector: Arc<dyn Connector>,
        metrics: Arc<RealtimeMetrics>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                connector,
                policy: ReconnectPolicy::from_config(config),
                max_message_size: config.max_message_size,
                link: Mutex::new(Link {
                    state: ConnectionState::Disconnected,
                    attempts: 0,
                    in_flight: false,
                    generation: 0,
                    outbound: None,
                    reconnect_timer: None,
                }),
                handlers: HandlerTable::default(),
                observers: ObserverSet::default(),
                metrics,
            }),
        }
    }

    /// Creates a manager dialing the configured WebSocket endpoint.
    pub fn websocket(config: &RealtimeConfig, metrics: Arc<RealtimeMetrics>) -> Self {
        Self::new(config, Arc::new(WebSocketConnector::from_config(config)), metrics)
    }

    fn link(&self) -> MutexGuard<'_, Link> {
        self.shared.link.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Opens the connection.
    ///
    /// Resolves once the transport is open. Fails with `AlreadyConnecting`
    /// while another attempt is in flight and with `TransientConnection`
    /// when the transport cannot be opened; an already open connection
    /// resolves immediately. A pending reconnect timer is superseded.
    pub async fn connect(&self) -> RealtimeResult<()> {
        let generation = {
            let mut link = self.link();
            if link.in_flight {
                return Err(RealtimeError::AlreadyConnecting);
            }
            if link.state == ConnectionState::Connected {
                return Ok(());
            }
            if let Some(timer) = link.reconnect_timer.take() {
                timer.abort();
            }
            link.in_flight = true;
            link.generation += 1;
            link.state = ConnectionState::Connecting;
            link.generation
        };
        info!("Connecting to real-time endpoint");

        let mut attempt = PendingConnect {
            manager: self,
            generation,
            armed: true,
        };
        let result = self.establish(generation, false).await;
        attempt.armed = false;
        result
    }

    /// Releases an attempt whose `connect()` future was dropped before the
    /// transport answered.
    fn abandon(&self, generation: u64) {
        let mut link = self.link();
        if link.generation != generation || !link.in_flight {
            return;
        }
        link.generation += 1;
        link.in_flight = false;
        link.state = ConnectionState::Disconnected;
        drop(link);
        debug!("Connection attempt abandoned by caller");
    }

    /// One open attempt for `generation`.
    async fn establish(&self, generation: u64, reconnecting: bool) -> RealtimeResult<()> {
        let result = self.shared.connector.open().await;

        let mut link = self.link();
        if link.generation != generation {
            if let Ok(transport) = result {
                let _ = transport.outbound.send(TransportCommand::Close);
            }
            debug!("Connection attempt superseded");
            return Err(RealtimeError::TransientConnection(
                "connection attempt cancelled".into(),
            ));
        }
        link.in_flight = false;

        match result {
            Ok(transport) => {
                link.state = ConnectionState::Connected;
                link.attempts = 0;
                link.outbound = Some(transport.outbound);
                drop(link);

                tokio::spawn(self.clone().read_loop(generation, transport.inbound));
                info!("Real-time connection established");
                self.notify(&ConnectionStatus::Connected);
                Ok(())
            }
            Err(e) => {
                if !reconnecting {
                    link.state = ConnectionState::Disconnected;
                }
                drop(link);

                warn!(error = %e, "Real-time connection failed");
                self.notify(&ConnectionStatus::Error(e.to_string()));
                if reconnecting {
                    self.schedule_reconnect(generation);
                }
                Err(e)
            }
        }
    }

    /// Pumps transport events until the transport ends or is superseded.
    async fn read_loop(
        self,
        generation: u64,
        mut inbound: mpsc::UnboundedReceiver<TransportEvent>,
    ) {
        while let Some(event) = inbound.recv().await {
            if self.link().generation != generation {
                return;
            }
            match event {
                TransportEvent::Message(raw) => self.dispatch(&raw),
                TransportEvent::Closed { clean } => {
                    self.handle_close(generation, clean, None);
                    return;
                }
                TransportEvent::Error(reason) => {
                    self.handle_close(generation, false, Some(reason));
                    return;
                }
            }
        }
        self.handle_close(generation, false, Some("transport ended".into()));
    }

    fn handle_close(&self, generation: u64, clean: bool, reason: Option<String>) {
        {
            let mut link = self.link();
            if link.generation != generation {
                return;
            }
            link.outbound = None;
            link.state = if clean {
                ConnectionState::Disconnected
            } else {
                ConnectionState::Reconnecting
            };
        }

        if clean {
            info!("Real-time connection closed");
            self.notify(&ConnectionStatus::Disconnected);
            return;
        }

        if let Some(reason) = reason {
            warn!(error = %reason, "Real-time transport error");
            self.notify(&ConnectionStatus::Error(reason));
        }
        warn!("Real-time connection lost");
        self.notify(&ConnectionStatus::Disconnected);
        self.schedule_reconnect(generation);
    }

    /// Schedules the next reconnect, or gives up once the bound is reached.
    fn schedule_reconnect(&self, generation: u64) {
        let status = {
            let mut link = self.link();
            if link.generation != generation {
                return;
            }
            let attempt = link.attempts + 1;
            match self.shared.policy.delay_for(attempt) {
                Some(delay) => {
                    link.attempts = attempt;
                    link.state = ConnectionState::Reconnecting;
                    let manager = self.clone();
                    link.reconnect_timer = Some(tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        manager.reconnect(generation).await;
                    }));
                    ConnectionStatus::Reconnecting { attempt, delay }
                }
                None => {
                    link.state = ConnectionState::Disconnected;
                    link.reconnect_timer = None;
                    ConnectionStatus::GaveUp {
                        attempts: link.attempts,
                    }
                }
            }
        };

        match &status {
            ConnectionStatus::Reconnecting { attempt, delay } => {
                self.shared.metrics.reconnect_scheduled();
                info!(
                    attempt = attempt,
                    max_attempts = self.shared.policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Reconnect scheduled"
                );
            }
            ConnectionStatus::GaveUp { attempts } => {
                let terminal = RealtimeError::TerminalConnection { attempts: *attempts };
                error!(error = %terminal, "Giving up on real-time connection");
            }
            _ => {}
        }
        self.notify(&status);
    }

    async fn reconnect(&self, generation: u64) {
        let attempt = {
            let mut link = self.link();
            if link.generation != generation || link.in_flight {
                return;
            }
            link.reconnect_timer = None;
            link.in_flight = true;
            link.attempts
        };
        info!(
            attempt = attempt,
            max_attempts = self.shared.policy.max_attempts,
            "Attempting to reconnect"
        );
        // Failures reschedule inside establish.
        let _ = self.establish(generation, true).await;
    }

    /// Closes the connection cleanly and cancels any pending reconnect.
    ///
    /// Safe to call in any state.
    pub fn disconnect(&self) {
        let (outbound, previous) = {
            let mut link = self.link();
            link.generation += 1;
            link.in_flight = false;
            link.attempts = 0;
            if let Some(timer) = link.reconnect_timer.take() {
                timer.abort();
            }
            let previous = link.state;
            link.state = ConnectionState::Disconnected;
            (link.outbound.take(), previous)
        };

        if let Some(outbound) = outbound {
            let _ = outbound.send(TransportCommand::Close);
        }
        if previous != ConnectionState::Disconnected {
            info!(previous = %previous, "Real-time connection closed by client");
            self.notify(&ConnectionStatus::Disconnected);
        }
    }

    /// Sends one message, assigning a fresh id and the current timestamp.
    ///
    /// Only allowed while `Connected`; otherwise fails with `NotConnected`
    /// and nothing is queued.
    pub fn send(&self, message: OutgoingMessage) -> RealtimeResult<WireMessage> {
        let link = self.link();
        let outbound = match (&link.state, &link.outbound) {
            (ConnectionState::Connected, Some(outbound)) => outbound,
            _ => return Err(RealtimeError::NotConnected),
        };

        let stamped = message.stamp();
        let raw = serde_json::to_string(&stamped)?;
        outbound
            .send(TransportCommand::Send(raw))
            .map_err(|_| RealtimeError::NotConnected)?;
        drop(link);

        self.shared.metrics.message_sent();
        debug!(id = %stamped.id, message_type = %stamped.message_type, "Message sent");
        Ok(stamped)
    }

    /// Decodes one inbound payload and invokes the handlers of its type.
    fn dispatch(&self, raw: &str) {
        let message = match decode_inbound(raw, self.shared.max_message_size) {
            Ok(message) => message,
            Err(e) => {
                self.shared.metrics.malformed();
                warn!(error = %e, "Dropping malformed inbound message");
                return;
            }
        };
        self.shared.metrics.message_received();

        let handlers = self.shared.handlers.for_type(message.message_type);
        if handlers.is_empty() {
            debug!(message_type = %message.message_type, "No handler registered; message dropped");
            return;
        }
        for handler in &handlers {
            if !invoke_isolated(handler.as_ref(), &message, message.message_type.as_str()) {
                self.shared.metrics.listener_panicked();
            }
        }
    }

    /// Registers a handler for one message type; handlers of a type run in
    /// registration order.
    pub fn subscribe_to_type<F>(&self, message_type: MessageType, handler: F) -> HandlerId
    where
        F: Fn(&WireMessage) + Send + Sync + 'static,
    {
        let id = self.shared.handlers.add(message_type, Arc::new(handler));
        debug!(message_type = %message_type, handler = id, "Handler registered");
        id
    }

    /// Removes a single handler. Returns whether it was registered.
    pub fn remove_handler(&self, id: HandlerId) -> bool {
        self.shared.handlers.remove(id)
    }

    /// Removes every handler for a message type.
    pub fn unsubscribe_from_type(&self, message_type: MessageType) {
        let removed = self.shared.handlers.remove_type(message_type);
        debug!(message_type = %message_type, removed = removed, "Handlers removed");
    }

    /// Number of handlers registered for a message type.
    pub fn handler_count(&self, message_type: MessageType) -> usize {
        self.shared.handlers.count(message_type)
    }

    /// Registers a connection-status observer.
    pub fn on_connection_change<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&ConnectionStatus) + Send + Sync + 'static,
    {
        let listener: Listener<ConnectionStatus> = Arc::new(observer);
        let id = self.shared.observers.add(listener);
        let observers = self.shared.observers.shared();
        Subscription::new(move || {
            observers
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .retain(|(oid, _)| *oid != id);
        })
    }

    fn notify(&self, status: &ConnectionStatus) {
        let panicked = self.shared.observers.notify(status);
        for _ in 0..panicked {
            self.shared.metrics.listener_panicked();
        }
    }

    /// Sends the `join_room` control message.
    pub fn join_room(&self, room: &str) -> RealtimeResult<WireMessage> {
        self.room_control(RoomAction::JoinRoom, room)
    }

    /// Sends the `leave_room` control message.
    pub fn leave_room(&self, room: &str) -> RealtimeResult<WireMessage> {
        self.room_control(RoomAction::LeaveRoom, room)
    }

    fn room_control(&self, action: RoomAction, room: &str) -> RealtimeResult<WireMessage> {
        let message = RoomControl {
            action,
            room: room.to_string(),
        }
        .into_message();
        self.send(message)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.link().state
    }

    /// Whether `send()` is currently allowed.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Reconnect attempts made since the last successful open.
    pub fn reconnect_attempts(&self) -> u32 {
        self.link().attempts
    }

    /// The reconnect schedule in use.
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        self.shared.policy
    }

    /// Shared counters.
    pub fn metrics(&self) -> &Arc<RealtimeMetrics> {
        &self.shared.metrics
    }
}
