use serde::Deserialize;
use std::time::Duration;

/// Base address of the exchange-rate push feed.
pub const DEFAULT_WS_URL: &str = "ws://localhost:8080/ws/exchange-rates";

/// Environment variable holding the bearer token, unless overridden.
pub const DEFAULT_TOKEN_VAR: &str = "RATES_STREAM_TOKEN";

/// Configuration for the rate stream manager.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamConfig {
    /// WebSocket URL (e.g. "ws://localhost:8080/ws/exchange-rates")
    #[serde(default = "default_ws_url")]
    pub ws_url: String,

    /// Fixed delay between reconnect attempts in milliseconds (default: 5000)
    pub reconnect_interval_ms: Option<u64>,

    /// Max time for the websocket handshake in milliseconds (default: 10000)
    pub handshake_timeout_ms: Option<u64>,

    /// Keepalive ping interval in milliseconds (default: 30000)
    pub ping_interval_ms: Option<u64>,

    /// Environment variable read for the bearer token (default: RATES_STREAM_TOKEN)
    pub token_var: Option<String>,

    /// Enable verbose tracing logs (default: false)
    pub verbose: Option<bool>,
}

fn default_ws_url() -> String {
    DEFAULT_WS_URL.to_string()
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            reconnect_interval_ms: None,
            handshake_timeout_ms: None,
            ping_interval_ms: None,
            token_var: None,
            verbose: None,
        }
    }
}

impl StreamConfig {
    /// Build a config from `RATES_STREAM_URL`, `RATES_RECONNECT_INTERVAL_MS`,
    /// `RATES_HANDSHAKE_TIMEOUT_MS`, `RATES_PING_INTERVAL_MS`,
    /// `RATES_STREAM_TOKEN_VAR` and `RATES_VERBOSE`, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Self {
            ws_url: non_empty("RATES_STREAM_URL").unwrap_or_else(default_ws_url),
            reconnect_interval_ms: non_empty("RATES_RECONNECT_INTERVAL_MS")
                .and_then(|v| v.parse::<u64>().ok()),
            handshake_timeout_ms: non_empty("RATES_HANDSHAKE_TIMEOUT_MS")
                .and_then(|v| v.parse::<u64>().ok()),
            ping_interval_ms: non_empty("RATES_PING_INTERVAL_MS")
                .and_then(|v| v.parse::<u64>().ok()),
            token_var: non_empty("RATES_STREAM_TOKEN_VAR"),
            verbose: non_empty("RATES_VERBOSE")
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes")),
        }
    }

    pub fn reconnect_interval_ms(&self) -> u64 {
        match self.reconnect_interval_ms {
            Some(ms) if ms > 0 => ms,
            _ => 5_000,
        }
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms())
    }

    pub fn handshake_timeout_ms(&self) -> u64 {
        match self.handshake_timeout_ms {
            Some(ms) if ms > 0 => ms,
            _ => 10_000,
        }
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms())
    }

    pub fn ping_interval_ms(&self) -> u64 {
        match self.ping_interval_ms {
            Some(ms) if ms > 0 => ms,
            _ => 30_000,
        }
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms())
    }

    pub fn token_var(&self) -> &str {
        self.token_var.as_deref().unwrap_or(DEFAULT_TOKEN_VAR)
    }

    pub fn verbose(&self) -> bool {
        self.verbose.unwrap_or(false)
    }
}
