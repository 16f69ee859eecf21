//! # scopecast-realtime
//!
//! Real-time event distribution layer. Provides:
//!
//! - A client connection manager with bounded exponential reconnect
//! - Scope channels (`user:`, `org:`, `room:`) multiplexed over one broker
//!   subscription each
//! - Durable event publishing through a pluggable broker
//! - Room presence with full-set change broadcasts
//! - Notification, chat and collaboration services over the connection

pub mod broker;
pub mod channel;
pub mod connection;
pub mod error;
pub mod event;
pub mod listener;
pub mod message;
pub mod metrics;
pub mod presence;
pub mod publisher;
pub mod server;
pub mod services;
pub mod subscription;

pub use broker::{EventBroker, MemoryBroker};
pub use channel::ChannelRegistry;
pub use connection::{ConnectionManager, ConnectionState, ConnectionStatus};
pub use error::{RealtimeError, RealtimeResult};
pub use event::{Event, EventKind, ScopeAttributes, ScopeKey};
pub use message::{MessageType, OutgoingMessage, WireMessage};
pub use presence::RoomPresence;
pub use publisher::EventPublisher;
pub use server::RealtimeHub;
pub use subscription::Subscription;
