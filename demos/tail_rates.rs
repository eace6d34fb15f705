//! Tail the live rate feed and print the board on every update.
//!
//! ```text
//! RATES_STREAM_URL=ws://localhost:8080/ws/exchange-rates \
//! RATES_STREAM_TOKEN=<jwt> \
//! cargo run --example tail_rates
//! ```
//!
//! Pass pair identifiers as arguments to flag notifications about them.

use rates_core::logging::init_tracing;
use rates_core::{
    format_rate, RateBoard, StreamConfig, StreamError, StreamEvent, StreamManager, SubscriptionSet,
};

#[tokio::main]
async fn main() -> Result<(), StreamError> {
    let config = StreamConfig::from_env();
    init_tracing(config.verbose());

    let subscriptions: SubscriptionSet = std::env::args().skip(1).collect();
    let manager = StreamManager::new(config)?;
    let mut events = manager.subscribe();
    let mut board = RateBoard::new();

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                board.apply(&event);
                match &event {
                    StreamEvent::RatesUpdated(_) => print_board(&board),
                    StreamEvent::ConnectivityChanged(connected) => {
                        println!("connected: {connected}");
                        if board.is_stale() {
                            println!("showing last received rates");
                        }
                    }
                    StreamEvent::Notified(notification) => {
                        let marker = if subscriptions.is_relevant(notification) { "*" } else { " " };
                        println!("{marker} {notification:?}");
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                manager.disconnect();
                break;
            }
        }
    }

    Ok(())
}

fn print_board(board: &RateBoard) {
    for (pair, rate) in board.sorted_entries() {
        println!("{pair:>12}  {}", format_rate(pair, rate));
    }
}
