//! Consumer-side rate board.
//!
//! Holds what a live ticker shows: the last full snapshot, whether the feed is
//! currently up, when data last arrived, and the most recent notification.
//! Snapshots replace the board wholesale. When the feed drops, the last data
//! stays on the board and [`RateBoard::is_stale`] turns true.

use crate::types::event::StreamEvent;
use crate::types::rates::{Notification, Rate, RateSnapshot};
use rust_decimal::RoundingStrategy;
use std::cmp::Ordering;
use std::time::SystemTime;

/// Gold quote, shown first and with two decimals.
pub const GOLD_PAIR: &str = "GRAM ALTIN";

/// Pairs promoted above the rest of the board.
pub const MAJOR_PAIRS: [&str; 6] = ["USD/TRY", "EUR/TRY", "GBP/TRY", "USD/EUR", "EUR/USD", GOLD_PAIR];

/// Display tier of a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RateTier {
    Gold,
    Major,
    Other,
}

impl RateTier {
    pub fn of(pair: &str) -> Self {
        if pair == GOLD_PAIR {
            RateTier::Gold
        } else if MAJOR_PAIRS.contains(&pair) {
            RateTier::Major
        } else {
            RateTier::Other
        }
    }
}

/// Render a rate the way the board shows it: 2 decimals for gold, 4 otherwise.
/// Halves round away from zero.
pub fn format_rate(pair: &str, rate: Rate) -> String {
    let dp = if pair == GOLD_PAIR { 2 } else { 4 };
    format!("{:.*}", dp as usize, rate.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero))
}

#[derive(Debug, Clone, Default)]
pub struct RateBoard {
    rates: RateSnapshot,
    connected: bool,
    last_updated: Option<SystemTime>,
    last_notification: Option<Notification>,
}

impl RateBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one stream event into the board.
    pub fn apply(&mut self, event: &StreamEvent) {
        match event {
            StreamEvent::RatesUpdated(rates) => self.replace_rates(rates.clone()),
            StreamEvent::ConnectivityChanged(connected) => self.set_connected(*connected),
            StreamEvent::Notified(notification) => {
                self.last_notification = Some(notification.clone());
            }
        }
    }

    pub fn replace_rates(&mut self, rates: RateSnapshot) {
        self.rates = rates;
        self.last_updated = Some(SystemTime::now());
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    pub fn rates(&self) -> &RateSnapshot {
        &self.rates
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Showing data from a feed that is currently down.
    pub fn is_stale(&self) -> bool {
        !self.connected && !self.rates.is_empty()
    }

    pub fn last_updated(&self) -> Option<SystemTime> {
        self.last_updated
    }

    pub fn last_notification(&self) -> Option<&Notification> {
        self.last_notification.as_ref()
    }

    /// Entries in display order: gold, then majors, then everything else;
    /// alphabetical within a tier.
    pub fn sorted_entries(&self) -> Vec<(&str, Rate)> {
        let mut entries: Vec<(&str, Rate)> = self.rates.iter().collect();
        entries.sort_by(|(a, _), (b, _)| compare_pairs(a, b));
        entries
    }
}

fn compare_pairs(a: &str, b: &str) -> Ordering {
    RateTier::of(a).cmp(&RateTier::of(b)).then_with(|| a.cmp(b))
}
