//! Wire message definitions, room control sub-protocol and validation.

pub mod control;
pub mod types;
pub mod validator;

pub use control::{RoomAction, RoomControl};
pub use types::{MessageType, OutgoingMessage, WireMessage};
