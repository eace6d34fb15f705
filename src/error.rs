use std::time::Duration;
use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

/// Errors produced while building a manager or opening a transport link.
///
/// Once a manager is running none of these reach the consumer; they are
/// logged and folded into `on_connection_change(false)`.
#[derive(Debug, Error)]
pub enum StreamError {
    /// Configured endpoint is not a valid URL.
    #[error("invalid stream endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    /// Endpoint parsed but is not a websocket URL.
    #[error("unsupported stream endpoint scheme: {0}")]
    UnsupportedScheme(String),

    /// The manager was created outside a tokio runtime.
    #[error("no tokio runtime available")]
    NoRuntime,

    /// Websocket transport error.
    #[error("websocket error: {0}")]
    WebSocket(#[from] WsError),

    /// Server accepted the connection but did not finish the upgrade in time.
    #[error("websocket handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),

    /// Any other transport failure.
    #[error("transport error: {0}")]
    Transport(String),
}
