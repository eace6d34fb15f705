//! Inbound frame classification.
//!
//! Every text frame from the rate feed is exactly one of:
//!
//! - not JSON at all: a free-form notification, forwarded verbatim
//! - a JSON object with one entry: a single-pair notification
//! - a JSON object with two or more entries: a full rate snapshot
//!
//! Any other JSON (numbers, arrays, strings, empty objects) is rejected.

use crate::types::rates::{parse_rate, Notification, RateSnapshot};
use serde_json::{Map, Value};
use thiserror::Error;

// =============================================================================
// PUBLIC API
// =============================================================================

/// Classified inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    Snapshot(RateSnapshot),
    Notification(Notification),
}

/// Classify a raw text frame.
///
/// A single-entry object is always treated as a notification, even when the
/// server meant it as a one-pair snapshot; the wire format carries no tag to
/// tell the two apart.
pub fn classify_frame(frame: &str) -> Result<InboundMessage, ParseError> {
    let value: Value = match serde_json::from_str(frame) {
        Ok(value) => value,
        Err(_) => return Ok(InboundMessage::Notification(Notification::Text(frame.to_string()))),
    };

    match value {
        Value::Object(map) => classify_object(map),
        other => Err(ParseError::UnexpectedShape(json_kind(&other))),
    }
}

// =============================================================================
// INTERNAL HELPERS
// =============================================================================

fn classify_object(map: Map<String, Value>) -> Result<InboundMessage, ParseError> {
    match map.len() {
        0 => Err(ParseError::EmptyObject),
        1 => {
            let (pair, value) = map.into_iter().next().ok_or(ParseError::EmptyObject)?;
            let rate = parse_rate(&value).ok_or_else(|| ParseError::InvalidRate(pair.clone()))?;
            Ok(InboundMessage::Notification(Notification::Pair { pair, rate }))
        }
        _ => {
            let snapshot = map
                .into_iter()
                .map(|(pair, value)| match parse_rate(&value) {
                    Some(rate) => Ok((pair, rate)),
                    None => Err(ParseError::InvalidRate(pair)),
                })
                .collect::<Result<RateSnapshot, _>>()?;
            Ok(InboundMessage::Snapshot(snapshot))
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("expected a JSON object, got {0}")]
    UnexpectedShape(&'static str),
    #[error("empty JSON object")]
    EmptyObject,
    #[error("rate for {0:?} is neither a number nor a numeric string")]
    InvalidRate(String),
}

// =============================================================================
// TESTS
// =============================================================================
