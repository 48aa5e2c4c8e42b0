/*
[INPUT]:  Credentials and connection tuning (code or YAML/JSON)
[OUTPUT]: Validated TickerConfig and the authenticated socket URL
[POS]:    Configuration layer - streaming client setup
[UPDATE]: When adding new configuration options
*/

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, TickerError};
use crate::types::Mode;

pub const DEFAULT_SOCKET_URL: &str = "wss://ws.mstock.trade";
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 5_000;
pub const DEFAULT_PING_INTERVAL_MS: u64 = 2_500;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

/// Streaming client configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TickerConfig {
    /// API key issued by the venue
    pub api_key: String,
    /// Access token obtained from the REST login flow
    pub access_token: String,
    /// Base websocket endpoint
    #[serde(default = "default_socket_url")]
    pub socket_url: String,
    /// Reconnect attempts before giving up
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    /// Fixed delay between reconnect attempts
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    /// Websocket ping interval while connected
    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,
    /// Upper bound on TCP connect plus websocket handshake
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Mode used when `subscribe` is called without one
    #[serde(default)]
    pub default_mode: Mode,
    /// Reconnect after the socket drops
    #[serde(default = "default_true")]
    pub auto_reconnect: bool,
    /// Replay the subscription registry as soon as the socket opens
    #[serde(default = "default_true")]
    pub auto_resubscribe: bool,
    /// Verbose per-frame logging
    #[serde(default)]
    pub debug: bool,
}

impl TickerConfig {
    pub fn new(api_key: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            access_token: access_token.into(),
            socket_url: default_socket_url(),
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            ping_interval_ms: DEFAULT_PING_INTERVAL_MS,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            default_mode: Mode::default(),
            auto_reconnect: true,
            auto_resubscribe: true,
            debug: false,
        }
    }

    pub fn with_socket_url(mut self, socket_url: impl Into<String>) -> Self {
        self.socket_url = socket_url.into();
        self
    }

    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_default_mode(mut self, mode: Mode) -> Self {
        self.default_mode = mode;
        self
    }

    pub fn with_auto_resubscribe(mut self, enabled: bool) -> Self {
        self.auto_resubscribe = enabled;
        self
    }

    pub fn with_auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Check credentials and endpoint before any connection attempt.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(TickerError::Config("api_key must not be empty".to_string()));
        }
        if self.access_token.trim().is_empty() {
            return Err(TickerError::Config("access_token must not be empty".to_string()));
        }
        if self.ping_interval_ms == 0 {
            return Err(TickerError::Config("ping_interval_ms must be positive".to_string()));
        }
        if self.connect_timeout_ms == 0 {
            return Err(TickerError::Config("connect_timeout_ms must be positive".to_string()));
        }
        let url = Url::parse(&self.socket_url)?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(TickerError::Config(format!(
                "socket_url must use ws or wss, got {}",
                url.scheme()
            )));
        }
        Ok(())
    }

    /// `{socket_url}?ACCESS_TOKEN={token}&API_KEY={key}`
    pub fn connection_url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.socket_url)?;
        url.query_pairs_mut()
            .append_pair("ACCESS_TOKEN", &self.access_token)
            .append_pair("API_KEY", &self.api_key);
        Ok(url)
    }
}

fn default_socket_url() -> String {
    DEFAULT_SOCKET_URL.to_string()
}

fn default_max_reconnect_attempts() -> u32 {
    DEFAULT_MAX_RECONNECT_ATTEMPTS
}

fn default_reconnect_delay_ms() -> u64 {
    DEFAULT_RECONNECT_DELAY_MS
}

fn default_ping_interval_ms() -> u64 {
    DEFAULT_PING_INTERVAL_MS
}

fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

fn default_true() -> bool {
    true
}
