//! Consumer-facing delivery of stream events.
//!
//! A consumer hands the manager one [`StreamHandler`] at connect time. The
//! manager keeps it across reconnects, so nothing has to be re-registered.
//! Three flavours are provided:
//!
//! - implement [`StreamHandler`] directly (all methods default to no-ops)
//! - [`Callbacks`], three independently optional closures
//! - an `mpsc::UnboundedSender<StreamEvent>`, for consumers with their own loop

use crate::types::event::StreamEvent;
use crate::types::rates::{Notification, RateSnapshot};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Receives decoded stream events. Called from the manager's session task,
/// one event at a time, never concurrently for the same connection.
pub trait StreamHandler: Send + Sync {
    fn on_rates_update(&self, _rates: RateSnapshot) {}
    fn on_connection_change(&self, _connected: bool) {}
    fn on_notification(&self, _notification: Notification) {}
}

impl<T: StreamHandler + ?Sized> StreamHandler for Arc<T> {
    fn on_rates_update(&self, rates: RateSnapshot) {
        (**self).on_rates_update(rates)
    }

    fn on_connection_change(&self, connected: bool) {
        (**self).on_connection_change(connected)
    }

    fn on_notification(&self, notification: Notification) {
        (**self).on_notification(notification)
    }
}

/// Handler that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHandler;

impl StreamHandler for NoopHandler {}

type RatesFn = Box<dyn Fn(RateSnapshot) + Send + Sync>;
type ConnectionFn = Box<dyn Fn(bool) + Send + Sync>;
type NotificationFn = Box<dyn Fn(Notification) + Send + Sync>;

/// Closure-based handler; any callback left unset is skipped.
#[derive(Default)]
pub struct Callbacks {
    on_rates_update: Option<RatesFn>,
    on_connection_change: Option<ConnectionFn>,
    on_notification: Option<NotificationFn>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rates_update(mut self, f: impl Fn(RateSnapshot) + Send + Sync + 'static) -> Self {
        self.on_rates_update = Some(Box::new(f));
        self
    }

    pub fn with_connection_change(mut self, f: impl Fn(bool) + Send + Sync + 'static) -> Self {
        self.on_connection_change = Some(Box::new(f));
        self
    }

    pub fn with_notification(mut self, f: impl Fn(Notification) + Send + Sync + 'static) -> Self {
        self.on_notification = Some(Box::new(f));
        self
    }
}

impl StreamHandler for Callbacks {
    fn on_rates_update(&self, rates: RateSnapshot) {
        if let Some(ref f) = self.on_rates_update {
            f(rates);
        }
    }

    fn on_connection_change(&self, connected: bool) {
        if let Some(ref f) = self.on_connection_change {
            f(connected);
        }
    }

    fn on_notification(&self, notification: Notification) {
        if let Some(ref f) = self.on_notification {
            f(notification);
        }
    }
}

impl StreamHandler for mpsc::UnboundedSender<StreamEvent> {
    fn on_rates_update(&self, rates: RateSnapshot) {
        forward(self, StreamEvent::RatesUpdated(rates));
    }

    fn on_connection_change(&self, connected: bool) {
        forward(self, StreamEvent::ConnectivityChanged(connected));
    }

    fn on_notification(&self, notification: Notification) {
        forward(self, StreamEvent::Notified(notification));
    }
}

fn forward(tx: &mpsc::UnboundedSender<StreamEvent>, event: StreamEvent) {
    if tx.send(event).is_err() {
        debug!("Event receiver dropped, discarding stream event");
    }
}
