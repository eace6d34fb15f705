//! # rates-core — live exchange-rate stream client
//!
//! Keeps one WebSocket connection to a push-based exchange-rate feed and
//! delivers what it receives to a consumer:
//!
//! - **Full snapshots**: every tracked pair, replacing the previous view
//! - **Single-pair notifications**: one pair changed
//! - **Text notifications**: free-form server messages
//! - **Connectivity changes**: the socket opened or was lost
//!
//! Lost connections are retried on a fixed interval until the consumer
//! disconnects.
//!
//! ## Architecture
//!
//! ```text
//! Rate feed WS → [Transport] → [Manager] → classify_frame → StreamHandler
//!                                  ↑                             ↓
//!                          reconnect timer              RateBoard (consumer)
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! use rates_core::{RateBoard, StreamConfig, StreamManager};
//!
//! # async fn run() -> Result<(), rates_core::StreamError> {
//! let manager = StreamManager::new(StreamConfig::from_env())?;
//! let mut events = manager.subscribe();
//! let mut board = RateBoard::new();
//!
//! while let Some(event) = events.recv().await {
//!     board.apply(&event);
//! }
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod consumer;
pub mod error;
pub mod logging;
pub mod socket;
pub mod types;

pub use bridge::callbacks::{Callbacks, NoopHandler, StreamHandler};
pub use consumer::board::{format_rate, RateBoard, RateTier};
pub use consumer::subscriptions::SubscriptionSet;
pub use error::StreamError;
pub use socket::manager::{StreamManager, REFRESH_REQUEST};
pub use types::config::StreamConfig;
pub use types::event::{ConnectionState, StreamEvent, StreamStatus};
pub use types::rates::{Notification, Rate, RateSnapshot};
