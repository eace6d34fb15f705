use crate::types::rates::{Notification, RateSnapshot};
use serde::Serialize;

/// Event delivered to a channel consumer, one variant per callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Full snapshot; replaces whatever the consumer showed before.
    RatesUpdated(RateSnapshot),
    /// Socket opened (`true`) or was lost (`false`).
    ConnectivityChanged(bool),
    /// Single-pair change or free-form server message.
    Notified(Notification),
}

/// Lifecycle phase of the managed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Point-in-time view of the manager, for monitoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamStatus {
    pub state: ConnectionState,
    /// Whether a reconnect timer is currently scheduled.
    pub reconnect_pending: bool,
    /// Connection attempts started since the manager was created.
    pub connect_attempts: u64,
    /// Text frames received across all connections.
    pub frames_received: u64,
    pub last_frame_at_ms: Option<i64>,
}
