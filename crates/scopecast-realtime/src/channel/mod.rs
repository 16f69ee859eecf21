//! Scope channels multiplexed over broker subscriptions.

pub mod channel;
pub mod registry;

pub use registry::ChannelRegistry;
