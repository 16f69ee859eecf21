//! Client-side real-time connection: lifecycle, reconnect policy and
//! per-type message dispatch.

pub mod backoff;
pub mod handlers;
pub mod manager;
pub mod state;
pub mod transport;
pub mod websocket;

pub use backoff::ReconnectPolicy;
pub use handlers::HandlerId;
pub use manager::ConnectionManager;
pub use state::{ConnectionState, ConnectionStatus};
pub use transport::{Connector, TransportCommand, TransportEvent, TransportLink};
pub use websocket::WebSocketConnector;
