//! Room presence tracking.

pub mod room;

pub use room::{Participants, RoomPresence};
