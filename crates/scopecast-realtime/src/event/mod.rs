//! Typed events, scope keys and the durable record encoding.

pub mod record;
pub mod scope;
pub mod types;

pub use record::EventRecord;
pub use scope::ScopeKey;
pub use types::{Event, EventKind, ScopeAttributes};
