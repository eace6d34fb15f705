//! The consumer's subscribed pairs, fetched and mutated elsewhere (REST), and
//! matched here against notifications coming off the stream.

use crate::types::rates::Notification;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionSet {
    pairs: BTreeSet<String>,
}

impl SubscriptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the pair was not subscribed before.
    pub fn insert(&mut self, pair: impl Into<String>) -> bool {
        self.pairs.insert(pair.into())
    }

    pub fn remove(&mut self, pair: &str) -> bool {
        self.pairs.remove(pair)
    }

    pub fn contains(&self, pair: &str) -> bool {
        self.pairs.contains(pair)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Replace the whole set, e.g. after re-fetching it.
    pub fn replace<I, S>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pairs = pairs.into_iter().map(Into::into).collect();
    }

    /// Whether the consumer cares about this notification.
    ///
    /// Pair notifications match on the pair. Text notifications match when
    /// they mention a subscribed pair anywhere in the message.
    pub fn is_relevant(&self, notification: &Notification) -> bool {
        match notification {
            Notification::Pair { pair, .. } => self.contains(pair),
            Notification::Text(text) => self.pairs.iter().any(|p| text.contains(p.as_str())),
        }
    }
}

impl<S: Into<String>> FromIterator<S> for SubscriptionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            pairs: iter.into_iter().map(Into::into).collect(),
        }
    }
}
