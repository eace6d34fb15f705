//! Stream connection manager: one rate-feed socket, its reconnect timer, and
//! dispatch of decoded frames to the consumer's handler.
//!
//! Lifecycle:
//!
//! ```text
//! Disconnected --timer fires--> Connecting --open--> Connected
//!      ^                                                  |
//!      +------------------- close / error ----------------+
//! ```
//!
//! Only [`StreamManager::disconnect`] leaves the loop. Every connection
//! attempt gets a new epoch; events carrying an older epoch are dropped, which
//! is how a replaced or torn-down socket is kept from reaching the consumer.

use crate::bridge::callbacks::{NoopHandler, StreamHandler};
use crate::error::StreamError;
use crate::socket::credentials::{CredentialSource, EnvCredential};
use crate::socket::parser::{self, InboundMessage};
use crate::socket::transport::{CloseInfo, LinkEvent, OpenFuture, Transport, TungsteniteTransport};
use crate::types::config::StreamConfig;
use crate::types::event::{ConnectionState, StreamEvent, StreamStatus};
use secrecy::{ExposeSecret, SecretString};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use url::Url;

/// The only control message the feed understands.
pub const REFRESH_REQUEST: &str = "getRates";

/// Owns the rate-feed connection for one consumer.
///
/// Construct one per view that needs live rates; managers share nothing.
/// Dropping the manager disconnects it.
pub struct StreamManager {
    shared: Arc<Shared>,
}

struct Shared {
    base_url: Url,
    config: StreamConfig,
    transport: Arc<dyn Transport>,
    credentials: Arc<dyn CredentialSource>,
    runtime: Handle,
    state: Mutex<ManagerState>,
    connect_attempts: AtomicU64,
    frames_received: AtomicU64,
    last_frame_at_ms: AtomicI64,
}

#[derive(Default)]
struct ManagerState {
    /// Retained across reconnects.
    handler: Option<Arc<dyn StreamHandler>>,
    is_connecting: bool,
    connected: bool,
    epoch: u64,
    /// `false` already delivered for the current epoch.
    down_reported: bool,
    session: Option<Session>,
    reconnect_timer: Option<JoinHandle<()>>,
}

struct Session {
    task: JoinHandle<()>,
    outbound: Option<mpsc::UnboundedSender<String>>,
}

impl StreamManager {
    /// Create a manager on the tungstenite transport, reading the bearer token
    /// from the environment variable named by `config.token_var()`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: StreamConfig) -> Result<Self, StreamError> {
        let credentials = EnvCredential::new(config.token_var());
        let transport = TungsteniteTransport::from_config(&config);
        Self::with_parts(config, Arc::new(transport), Arc::new(credentials))
    }

    /// Create a manager with explicit transport and credential seams.
    pub fn with_parts(
        config: StreamConfig,
        transport: Arc<dyn Transport>,
        credentials: Arc<dyn CredentialSource>,
    ) -> Result<Self, StreamError> {
        let base_url = Url::parse(config.ws_url.trim())?;
        if !matches!(base_url.scheme(), "ws" | "wss") {
            return Err(StreamError::UnsupportedScheme(base_url.scheme().to_string()));
        }
        let runtime = Handle::try_current().map_err(|_| StreamError::NoRuntime)?;

        Ok(Self {
            shared: Arc::new(Shared {
                base_url,
                config,
                transport,
                credentials,
                runtime,
                state: Mutex::new(ManagerState::default()),
                connect_attempts: AtomicU64::new(0),
                frames_received: AtomicU64::new(0),
                last_frame_at_ms: AtomicI64::new(0),
            }),
        })
    }

    /// Start streaming to `handler`.
    ///
    /// Returns immediately; the handshake and everything after it are
    /// reported through the handler. Ignored while an attempt is in flight.
    pub fn connect<H: StreamHandler + 'static>(&self, handler: H) {
        self.shared.connect(Arc::new(handler));
    }

    /// Connect with a fresh channel and return its receiving end.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<StreamEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.connect(tx);
        rx
    }

    /// Tear the connection down and stop reconnecting. Safe in any state.
    ///
    /// Handlers run outside the manager's lock. A callback already past its
    /// liveness check on another thread may still complete after this
    /// returns; nothing is dispatched once it has.
    pub fn disconnect(&self) {
        self.shared.disconnect();
    }

    /// Ask the feed for a fresh snapshot, reconnecting first if the socket is
    /// not open.
    pub fn request_rates(&self) {
        self.shared.request_rates();
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.lock_state().connection_state()
    }

    pub fn is_connected(&self) -> bool {
        self.shared.lock_state().connected
    }

    pub fn has_pending_reconnect(&self) -> bool {
        self.shared.lock_state().reconnect_timer.is_some()
    }

    pub fn status(&self) -> StreamStatus {
        let (state, reconnect_pending) = {
            let guard = self.shared.lock_state();
            (guard.connection_state(), guard.reconnect_timer.is_some())
        };
        let last = self.shared.last_frame_at_ms.load(Ordering::Relaxed);

        StreamStatus {
            state,
            reconnect_pending,
            connect_attempts: self.shared.connect_attempts.load(Ordering::Relaxed),
            frames_received: self.shared.frames_received.load(Ordering::Relaxed),
            last_frame_at_ms: if last > 0 { Some(last) } else { None },
        }
    }
}

impl Drop for StreamManager {
    fn drop(&mut self) {
        self.shared.disconnect();
    }
}

impl ManagerState {
    fn connection_state(&self) -> ConnectionState {
        if self.connected {
            ConnectionState::Connected
        } else if self.is_connecting {
            ConnectionState::Connecting
        } else {
            ConnectionState::Disconnected
        }
    }
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, ManagerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn connect(self: &Arc<Self>, handler: Arc<dyn StreamHandler>) {
        let mut state = self.lock_state();
        if state.is_connecting {
            debug!("Connection attempt already in progress, ignoring connect");
            return;
        }

        state.handler = Some(handler);
        state.is_connecting = true;
        self.teardown(&mut state);
        state.connected = false;
        state.down_reported = false;
        let epoch = state.epoch;

        let url = self.connection_url(self.credentials.bearer_token());
        self.connect_attempts.fetch_add(1, Ordering::Relaxed);
        info!(epoch, endpoint = %self.base_url, "Connecting to rate stream");

        let open = self.transport.open(&url);
        let task = self.runtime.spawn(run_session(Arc::clone(self), epoch, open));
        state.session = Some(Session {
            task,
            outbound: None,
        });
    }

    fn disconnect(&self) {
        let mut state = self.lock_state();
        state.is_connecting = false;
        state.connected = false;
        self.teardown(&mut state);
        debug!(epoch = state.epoch, "Rate stream disconnected");
    }

    fn request_rates(self: &Arc<Self>) {
        let handler = {
            let state = self.lock_state();
            if state.connected {
                let sent = state
                    .session
                    .as_ref()
                    .and_then(|s| s.outbound.as_ref())
                    .is_some_and(|tx| tx.send(REFRESH_REQUEST.to_string()).is_ok());
                if sent {
                    debug!(epoch = state.epoch, "Requested rate refresh");
                    return;
                }
            }
            state
                .handler
                .clone()
                .unwrap_or_else(|| Arc::new(NoopHandler))
        };

        info!("Socket not open, reconnecting to serve rate request");
        self.connect(handler);
    }

    /// Detach and drop the current link and cancel any reconnect timer.
    ///
    /// Bumping the epoch first means nothing the old link still emits is
    /// dispatched. Aborting a task from inside itself takes effect at its next
    /// await point.
    fn teardown(&self, state: &mut ManagerState) {
        state.epoch += 1;
        if let Some(session) = state.session.take() {
            drop(session.outbound);
            session.task.abort();
        }
        if let Some(timer) = state.reconnect_timer.take() {
            timer.abort();
        }
    }

    fn connection_url(&self, token: Option<SecretString>) -> Url {
        let mut url = self.base_url.clone();
        match token {
            Some(token) => {
                url.query_pairs_mut().append_pair("token", token.expose_secret());
            }
            None => warn!("No bearer token available, connecting without authentication"),
        }
        url
    }

    /// Run `deliver` against the handler if `epoch` is still live. The check
    /// happens immediately before the call; the lock is not held during it.
    fn dispatch(&self, epoch: u64, deliver: impl FnOnce(&dyn StreamHandler)) -> bool {
        let handler = {
            let state = self.lock_state();
            if state.epoch != epoch {
                return false;
            }
            state.handler.clone()
        };
        match handler {
            Some(handler) => {
                deliver(&*handler);
                true
            }
            None => false,
        }
    }

    fn handle_open(&self, epoch: u64, outbound: mpsc::UnboundedSender<String>) -> bool {
        {
            let mut state = self.lock_state();
            if state.epoch != epoch {
                debug!(epoch, "Stale connection opened, discarding");
                return false;
            }

            state.is_connecting = false;
            state.connected = true;
            if let Some(timer) = state.reconnect_timer.take() {
                timer.abort();
            }
            if let Some(session) = state.session.as_mut() {
                session.outbound = Some(outbound.clone());
            }
        }

        info!(epoch, "Rate stream connected");
        self.dispatch(epoch, |handler| handler.on_connection_change(true));
        if outbound.send(REFRESH_REQUEST.to_string()).is_err() {
            warn!(epoch, "Link closed before initial rate request");
        }
        true
    }

    fn handle_frame(&self, epoch: u64, frame: &str) {
        if self.lock_state().epoch != epoch {
            debug!(epoch, "Frame from stale link, discarding");
            return;
        }
        self.frames_received.fetch_add(1, Ordering::Relaxed);
        self.last_frame_at_ms.store(now_ms(), Ordering::Relaxed);

        let message = match parser::classify_frame(frame) {
            Ok(message) => message,
            Err(e) => {
                warn!(epoch, error = %e, "Discarding unrecognised frame");
                return;
            }
        };

        self.dispatch(epoch, |handler| match message {
            InboundMessage::Snapshot(rates) => {
                debug!(epoch, pairs = rates.len(), "Rate snapshot received");
                handler.on_rates_update(rates);
            }
            InboundMessage::Notification(notification) => {
                debug!(epoch, ?notification, "Notification received");
                handler.on_notification(notification);
            }
        });
    }

    /// Transport error: report the drop, leave reconnecting to the close that
    /// follows.
    fn handle_error(&self, epoch: u64, err: &str) {
        error!(epoch, error = %err, "Rate stream error");
        if self.mark_down(epoch) {
            self.dispatch(epoch, |handler| handler.on_connection_change(false));
        }
    }

    /// Socket closed or handshake failed: report the drop and schedule a
    /// reconnect.
    fn handle_closed(self: &Arc<Self>, epoch: u64, info: &CloseInfo) {
        let report = {
            let mut state = self.lock_state();
            if state.epoch != epoch {
                return;
            }
            info!(
                epoch,
                code = ?info.code,
                reason = %info.reason,
                "Rate stream closed, scheduling reconnect"
            );
            state.is_connecting = false;
            state.connected = false;
            state.session = None;
            self.schedule_reconnect(&mut state);
            !std::mem::replace(&mut state.down_reported, true)
        };

        if report {
            self.dispatch(epoch, |handler| handler.on_connection_change(false));
        }
    }

    /// Flip connectivity off for `epoch`; true if `false` still needs
    /// reporting.
    fn mark_down(&self, epoch: u64) -> bool {
        let mut state = self.lock_state();
        if state.epoch != epoch {
            return false;
        }
        state.connected = false;
        state.is_connecting = false;
        !std::mem::replace(&mut state.down_reported, true)
    }

    fn schedule_reconnect(self: &Arc<Self>, state: &mut ManagerState) {
        if state.reconnect_timer.is_some() {
            return;
        }

        let period = self.config.reconnect_interval();
        info!(delay_ms = self.config.reconnect_interval_ms(), "Reconnect timer scheduled");

        let shared = Arc::clone(self);
        state.reconnect_timer = Some(self.runtime.spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                shared.reconnect_tick();
            }
        }));
    }

    fn reconnect_tick(self: &Arc<Self>) {
        let handler = self.lock_state().handler.clone();
        match handler {
            Some(handler) => {
                info!("Attempting reconnect");
                self.connect(handler);
            }
            None => warn!("Reconnect timer fired without a handler"),
        }
    }
}

async fn run_session(shared: Arc<Shared>, epoch: u64, open: OpenFuture) {
    let link = match open.await {
        Ok(link) => link,
        Err(e) => {
            warn!(epoch, error = %e, "Failed to open rate stream");
            shared.handle_closed(epoch, &CloseInfo::abnormal(e.to_string()));
            return;
        }
    };

    let mut inbound = link.inbound;
    if !shared.handle_open(epoch, link.outbound) {
        return;
    }

    while let Some(event) = inbound.recv().await {
        match event {
            LinkEvent::Frame(text) => shared.handle_frame(epoch, &text),
            LinkEvent::Error(e) => shared.handle_error(epoch, &e),
            LinkEvent::Closed(info) => {
                shared.handle_closed(epoch, &info);
                return;
            }
        }
    }

    shared.handle_closed(epoch, &CloseInfo::abnormal("link dropped"));
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
