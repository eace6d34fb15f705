use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::str::FromStr;

/// A single exchange rate. Decimal so "34.1200" survives the trip unchanged.
pub type Rate = Decimal;

/// Full rate mapping for every tracked pair, e.g. `USD/TRY` or `GRAM ALTIN`.
///
/// A snapshot always replaces the previous one wholesale; it is never merged
/// entry by entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RateSnapshot {
    rates: BTreeMap<String, Rate>,
}

impl RateSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, pair: &str) -> Option<Rate> {
        self.rates.get(pair).copied()
    }

    pub fn contains(&self, pair: &str) -> bool {
        self.rates.contains_key(pair)
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    /// Pair identifiers in lexical order.
    pub fn pairs(&self) -> impl Iterator<Item = &str> {
        self.rates.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Rate)> {
        self.rates.iter().map(|(pair, rate)| (pair.as_str(), *rate))
    }
}

impl FromIterator<(String, Rate)> for RateSnapshot {
    fn from_iter<I: IntoIterator<Item = (String, Rate)>>(iter: I) -> Self {
        Self {
            rates: iter.into_iter().collect(),
        }
    }
}

/// Something the server wants the consumer to know outside a full snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Notification {
    /// Free-form text frame, forwarded verbatim.
    Text(String),
    /// One pair changed.
    Pair { pair: String, rate: Rate },
}

impl Notification {
    /// The pair this notification is about, when it names exactly one.
    pub fn pair(&self) -> Option<&str> {
        match self {
            Notification::Pair { pair, .. } => Some(pair),
            Notification::Text(_) => None,
        }
    }
}

/// Read a rate off the wire: a JSON number or a numeric string.
///
/// Numbers go through their textual form so `34.12` does not pick up binary
/// float noise. Scientific notation is accepted for both forms.
pub fn parse_rate(value: &serde_json::Value) -> Option<Rate> {
    match value {
        serde_json::Value::Number(n) => parse_decimal(&n.to_string()),
        serde_json::Value::String(s) => parse_decimal(s.trim()),
        _ => None,
    }
}

fn parse_decimal(s: &str) -> Option<Rate> {
    if s.is_empty() {
        return None;
    }
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dec(s: &str) -> Rate {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_rate_number_keeps_textual_precision() {
        assert_eq!(parse_rate(&json!(34.12)), Some(dec("34.12")));
        assert_eq!(parse_rate(&json!(36)), Some(dec("36")));
    }

    #[test]
    fn test_parse_rate_numeric_string() {
        assert_eq!(parse_rate(&json!("2950.55")), Some(dec("2950.55")));
        assert_eq!(parse_rate(&json!(" 1.0850 ")), Some(dec("1.0850")));
    }

    #[test]
    fn test_parse_rate_scientific() {
        assert_eq!(parse_rate(&json!("1.5e-3")), Some(dec("0.0015")));
    }

    #[test]
    fn test_parse_rate_rejects_non_numeric() {
        assert_eq!(parse_rate(&json!("n/a")), None);
        assert_eq!(parse_rate(&json!("")), None);
        assert_eq!(parse_rate(&json!(null)), None);
        assert_eq!(parse_rate(&json!([1, 2])), None);
        assert_eq!(parse_rate(&json!(true)), None);
    }

    #[test]
    fn test_snapshot_accessors() {
        let snapshot: RateSnapshot = [
            ("USD/TRY".to_string(), dec("34.12")),
            ("EUR/TRY".to_string(), dec("36.5")),
        ]
        .into_iter()
        .collect();

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.get("USD/TRY"), Some(dec("34.12")));
        assert!(!snapshot.contains("GBP/TRY"));
        assert_eq!(snapshot.pairs().collect::<Vec<_>>(), vec!["EUR/TRY", "USD/TRY"]);
    }

    #[test]
    fn test_notification_pair() {
        let n = Notification::Pair {
            pair: "USD/TRY".to_string(),
            rate: dec("34.20"),
        };
        assert_eq!(n.pair(), Some("USD/TRY"));
        assert_eq!(Notification::Text("hello".to_string()).pair(), None);
    }
}
