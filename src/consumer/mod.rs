//! Consumer-side helpers built on top of the stream events.

pub mod board;
pub mod subscriptions;
