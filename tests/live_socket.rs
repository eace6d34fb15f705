//! End-to-end run of the tungstenite transport against a local websocket
//! server speaking the rate-feed protocol.

use futures_util::{SinkExt, StreamExt};
use rates_core::socket::credentials::{NoCredential, StaticCredential};
use rates_core::socket::transport::TungsteniteTransport;
use rates_core::{Notification, StreamConfig, StreamEvent, StreamManager, REFRESH_REQUEST};
use rust_decimal::Decimal;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

async fn bind() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind listener");
    let addr = listener.local_addr().expect("listener addr");
    (listener, addr)
}

/// Accept one websocket client, returning the socket and the request URI.
async fn accept(listener: &TcpListener) -> (WebSocketStream<TcpStream>, String) {
    let (stream, _) = timeout(Duration::from_secs(5), listener.accept())
        .await
        .expect("timed out waiting for client")
        .expect("accept tcp");

    let (uri_tx, uri_rx) = oneshot::channel();
    let ws = tokio_tungstenite::accept_hdr_async(stream, move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        let _ = uri_tx.send(req.uri().to_string());
        Ok(resp)
    })
    .await
    .expect("websocket handshake");

    (ws, uri_rx.await.expect("request uri"))
}

async fn expect_refresh(ws: &mut WebSocketStream<TcpStream>) {
    let msg = timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("timed out waiting for refresh request")
        .expect("client went away")
        .expect("read frame");
    assert_eq!(msg, Message::text(REFRESH_REQUEST));
}

async fn next_event(events: &mut mpsc::UnboundedReceiver<StreamEvent>) -> StreamEvent {
    timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for stream event")
        .expect("event channel closed")
}

fn config(addr: SocketAddr) -> StreamConfig {
    StreamConfig {
        ws_url: format!("ws://{addr}/ws/exchange-rates"),
        reconnect_interval_ms: Some(100),
        ..StreamConfig::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn live_feed_classifies_frames_and_sends_token() {
    let (listener, addr) = bind().await;
    let manager = StreamManager::with_parts(
        config(addr),
        Arc::new(TungsteniteTransport::new()),
        Arc::new(StaticCredential::new("jwt-123")),
    )
    .expect("build manager");

    let mut events = manager.subscribe();
    let (mut ws, uri) = accept(&listener).await;
    assert_eq!(uri, "/ws/exchange-rates?token=jwt-123");

    assert_eq!(next_event(&mut events).await, StreamEvent::ConnectivityChanged(true));
    expect_refresh(&mut ws).await;

    ws.send(Message::text(r#"{"USD/TRY": 34.12, "EUR/TRY": 36.5}"#)).await.unwrap();
    ws.send(Message::text(r#"{"USD/TRY": 34.20}"#)).await.unwrap();
    ws.send(Message::text("USD/TRY kuru güncellendi")).await.unwrap();

    let StreamEvent::RatesUpdated(rates) = next_event(&mut events).await else {
        panic!("expected a snapshot first");
    };
    assert_eq!(rates.len(), 2);
    assert_eq!(rates.get("EUR/TRY"), Some(Decimal::new(365, 1)));

    assert_eq!(
        next_event(&mut events).await,
        StreamEvent::Notified(Notification::Pair {
            pair: "USD/TRY".to_string(),
            rate: Decimal::new(3420, 2),
        })
    );
    assert_eq!(
        next_event(&mut events).await,
        StreamEvent::Notified(Notification::Text("USD/TRY kuru güncellendi".to_string()))
    );

    manager.request_rates();
    expect_refresh(&mut ws).await;

    manager.disconnect();
    let closing = timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("timed out waiting for close");
    assert!(matches!(closing, Some(Ok(Message::Close(_))) | Some(Err(_)) | None));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn live_feed_reconnects_after_server_close() {
    let (listener, addr) = bind().await;
    let manager = StreamManager::with_parts(
        config(addr),
        Arc::new(TungsteniteTransport::new()),
        Arc::new(NoCredential),
    )
    .expect("build manager");

    let mut events = manager.subscribe();
    let (mut ws, uri) = accept(&listener).await;
    assert_eq!(uri, "/ws/exchange-rates");
    assert_eq!(next_event(&mut events).await, StreamEvent::ConnectivityChanged(true));
    expect_refresh(&mut ws).await;

    ws.close(None).await.unwrap();
    assert_eq!(next_event(&mut events).await, StreamEvent::ConnectivityChanged(false));

    let (mut ws, _) = accept(&listener).await;
    assert_eq!(next_event(&mut events).await, StreamEvent::ConnectivityChanged(true));
    expect_refresh(&mut ws).await;
    assert_eq!(manager.status().connect_attempts, 2);

    manager.disconnect();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn live_feed_decodes_utf8_binary_frames() {
    let (listener, addr) = bind().await;
    let manager = StreamManager::with_parts(
        config(addr),
        Arc::new(TungsteniteTransport::new()),
        Arc::new(NoCredential),
    )
    .expect("build manager");

    let mut events = manager.subscribe();
    let (mut ws, _) = accept(&listener).await;
    assert_eq!(next_event(&mut events).await, StreamEvent::ConnectivityChanged(true));
    expect_refresh(&mut ws).await;

    ws.send(Message::Binary(br#"{"USD/TRY": 34.12, "EUR/TRY": 36.5}"#.to_vec()))
        .await
        .unwrap();
    ws.send(Message::Binary(vec![0xff, 0xfe, 0xfd])).await.unwrap();
    ws.send(Message::text("kur bülteni yayında")).await.unwrap();

    let StreamEvent::RatesUpdated(rates) = next_event(&mut events).await else {
        panic!("expected the binary snapshot");
    };
    assert_eq!(rates.get("USD/TRY"), Some(Decimal::new(3412, 2)));

    // Invalid UTF-8 is dropped without taking the link down.
    assert_eq!(
        next_event(&mut events).await,
        StreamEvent::Notified(Notification::Text("kur bülteni yayında".to_string()))
    );
    assert!(manager.is_connected());
    assert_eq!(manager.status().frames_received, 2);

    manager.disconnect();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn live_feed_retries_when_handshake_stalls() {
    let (listener, addr) = bind().await;
    // Accepts TCP and holds the sockets without ever answering the upgrade.
    let holder = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let config = StreamConfig {
        handshake_timeout_ms: Some(200),
        ..config(addr)
    };
    let manager = StreamManager::with_parts(
        config.clone(),
        Arc::new(TungsteniteTransport::from_config(&config)),
        Arc::new(NoCredential),
    )
    .expect("build manager");

    let mut events = manager.subscribe();
    assert_eq!(next_event(&mut events).await, StreamEvent::ConnectivityChanged(false));
    assert_eq!(next_event(&mut events).await, StreamEvent::ConnectivityChanged(false));
    assert!(manager.status().connect_attempts >= 2);

    manager.disconnect();
    holder.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn live_feed_pings_and_drops_silent_server() {
    let (listener, addr) = bind().await;
    let config = StreamConfig {
        ping_interval_ms: Some(100),
        ..config(addr)
    };
    let manager = StreamManager::with_parts(
        config.clone(),
        Arc::new(TungsteniteTransport::from_config(&config)),
        Arc::new(NoCredential),
    )
    .expect("build manager");

    let mut events = manager.subscribe();
    let (mut ws, _) = accept(&listener).await;
    assert_eq!(next_event(&mut events).await, StreamEvent::ConnectivityChanged(true));
    expect_refresh(&mut ws).await;

    let ping = timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("timed out waiting for keepalive ping")
        .expect("client went away")
        .expect("read frame");
    assert!(matches!(ping, Message::Ping(_)));

    // Server stops reading and sends nothing: the client gives up on the link.
    assert_eq!(next_event(&mut events).await, StreamEvent::ConnectivityChanged(false));

    manager.disconnect();
    drop(ws);
}
