//! Rate-feed socket layer.
//!
//! - `manager`: connection lifecycle, reconnect timer, dispatch
//! - `parser`: frame classification
//! - `transport`: link abstraction and the tungstenite implementation
//! - `credentials`: bearer token lookup

pub mod credentials;
pub mod manager;
pub mod parser;
pub mod transport;
