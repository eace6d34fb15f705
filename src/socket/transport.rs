//! Transport seam and the `tokio-tungstenite` implementation.
//!
//! A [`Transport`] opens one [`Link`] per connection attempt. The link is a
//! pair of channels: outbound text frames go in, [`LinkEvent`]s come out.
//! Dropping the outbound sender closes the socket.
//!
//! The tungstenite link bounds the handshake and sends a keepalive ping every
//! interval. A link that hears nothing for two intervals is closed as
//! abnormal so the manager reconnects.

use crate::error::StreamError;
use crate::types::config::StreamConfig;
use futures_util::future::BoxFuture;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, timeout, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

/// Close code reported when the socket went away without a close frame.
pub const ABNORMAL_CLOSE: u16 = 1006;

/// How a link ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    pub code: Option<u16>,
    pub reason: String,
}

impl CloseInfo {
    pub fn abnormal(reason: impl Into<String>) -> Self {
        Self {
            code: Some(ABNORMAL_CLOSE),
            reason: reason.into(),
        }
    }
}

/// Event surfaced by an open link, in the order the socket produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// Inbound text frame.
    Frame(String),
    /// Transport error. A `Closed` event always follows.
    Error(String),
    /// Socket closed; no further events follow.
    Closed(CloseInfo),
}

/// An open connection as seen by the manager.
#[derive(Debug)]
pub struct Link {
    pub outbound: mpsc::UnboundedSender<String>,
    pub inbound: mpsc::UnboundedReceiver<LinkEvent>,
}

pub type OpenFuture = BoxFuture<'static, Result<Link, StreamError>>;

/// Opens links to the rate feed.
///
/// `open` is called with the manager's state lock held; it must only build
/// the future and leave the handshake to it.
pub trait Transport: Send + Sync {
    fn open(&self, url: &Url) -> OpenFuture;
}

/// WebSocket transport over `tokio-tungstenite`.
#[derive(Debug, Clone, Copy)]
pub struct TungsteniteTransport {
    handshake_timeout: Duration,
    ping_interval: Duration,
}

impl Default for TungsteniteTransport {
    fn default() -> Self {
        Self::from_config(&StreamConfig::default())
    }
}

impl TungsteniteTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take handshake timeout and ping interval from `config`.
    pub fn from_config(config: &StreamConfig) -> Self {
        Self {
            handshake_timeout: config.handshake_timeout(),
            ping_interval: config.ping_interval(),
        }
    }
}

impl Transport for TungsteniteTransport {
    fn open(&self, url: &Url) -> OpenFuture {
        let url = url.to_string();
        let Self {
            handshake_timeout,
            ping_interval,
        } = *self;

        Box::pin(async move {
            let (ws_stream, _) = timeout(handshake_timeout, connect_async(url))
                .await
                .map_err(|_| StreamError::HandshakeTimeout(handshake_timeout))??;
            let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
            let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

            tokio::spawn(pump(ws_stream, outbound_rx, inbound_tx, ping_interval));

            Ok(Link {
                outbound: outbound_tx,
                inbound: inbound_rx,
            })
        })
    }
}

/// Shuttle frames between the socket and the link channels until either side
/// goes away.
async fn pump(
    ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
    inbound_tx: mpsc::UnboundedSender<LinkEvent>,
    ping_interval: Duration,
) {
    let (mut write, mut read) = ws_stream.split();

    // First tick one interval out, not immediately
    let mut ping_timer = interval_at(Instant::now() + ping_interval, ping_interval);
    let mut last_heard = Instant::now();

    loop {
        tokio::select! {
            outbound = outbound_rx.recv() => {
                match outbound {
                    Some(text) => {
                        if let Err(e) = write.send(Message::Text(text)).await {
                            let _ = inbound_tx.send(LinkEvent::Error(e.to_string()));
                            let _ = inbound_tx.send(LinkEvent::Closed(CloseInfo::abnormal("send failed")));
                            return;
                        }
                    }
                    None => {
                        // Link dropped by the manager
                        debug!("Link released, closing WS");
                        let _ = write.send(Message::Close(None)).await;
                        return;
                    }
                }
            }
            msg = read.next() => {
                last_heard = Instant::now();
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if inbound_tx.send(LinkEvent::Frame(text)).is_err() {
                            let _ = write.send(Message::Close(None)).await;
                            return;
                        }
                    }
                    Some(Ok(Message::Binary(data))) => match String::from_utf8(data) {
                        Ok(text) => {
                            if inbound_tx.send(LinkEvent::Frame(text)).is_err() {
                                let _ = write.send(Message::Close(None)).await;
                                return;
                            }
                        }
                        Err(_) => warn!("Dropping non UTF-8 binary frame"),
                    },
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = write.send(Message::Pong(data)).await {
                            let _ = inbound_tx.send(LinkEvent::Error(e.to_string()));
                            let _ = inbound_tx.send(LinkEvent::Closed(CloseInfo::abnormal("pong failed")));
                            return;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {}
                    Some(Ok(Message::Close(frame))) => {
                        info!(?frame, "Server closed connection");
                        let info = match frame {
                            Some(frame) => CloseInfo {
                                code: Some(u16::from(frame.code)),
                                reason: frame.reason.into_owned(),
                            },
                            None => CloseInfo { code: None, reason: String::new() },
                        };
                        let _ = inbound_tx.send(LinkEvent::Closed(info));
                        return;
                    }
                    Some(Err(e)) => {
                        let _ = inbound_tx.send(LinkEvent::Error(e.to_string()));
                        let _ = inbound_tx.send(LinkEvent::Closed(CloseInfo::abnormal(e.to_string())));
                        return;
                    }
                    None => {
                        // Stream ended
                        let _ = inbound_tx.send(LinkEvent::Closed(CloseInfo::abnormal("stream ended")));
                        return;
                    }
                    _ => {} // Frame variant (ignored)
                }
            }
            _ = ping_timer.tick() => {
                let silent = last_heard.elapsed();
                if silent >= ping_interval * 2 {
                    warn!(?silent, "No traffic from server, dropping link");
                    let _ = inbound_tx.send(LinkEvent::Error("keepalive timeout".to_string()));
                    let _ = inbound_tx.send(LinkEvent::Closed(CloseInfo::abnormal("keepalive timeout")));
                    return;
                }
                if let Err(e) = write.send(Message::Ping(Vec::new())).await {
                    let _ = inbound_tx.send(LinkEvent::Error(e.to_string()));
                    let _ = inbound_tx.send(LinkEvent::Closed(CloseInfo::abnormal("ping failed")));
                    return;
                }
            }
        }
    }
}
