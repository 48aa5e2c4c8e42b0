/*
[INPUT]:  Error sources (wire decoding, websocket transport, venue control frames, config)
[OUTPUT]: Structured error types carried through results and error events
[POS]:    Error handling layer - unified error types for entire crate
[UPDATE]: When adding new error sources or changing failure semantics
*/

use thiserror::Error;

/// Main error type for the mStock ticker.
///
/// Every variant owns plain data so the error can be cloned into
/// [`TickerEvent::Error`](crate::TickerEvent::Error) and still be returned
/// from fallible calls.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TickerError {
    /// Binary frame whose length or layout matches no known packet shape
    #[error("Malformed frame ({len} bytes): {reason}")]
    MalformedFrame { len: usize, reason: String },

    /// Socket-level failure (handshake, read, write)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Venue sent a `{"type":"error"}` control frame
    #[error("Venue error: {0}")]
    Protocol(String),

    /// Reconnect attempts reached the configured maximum
    #[error("Reconnect attempts exhausted after {attempts} tries")]
    ReconnectExhausted { attempts: u32 },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The connection worker is gone and can take no more commands
    #[error("Ticker client closed")]
    ClientClosed,
}

impl TickerError {
    /// Check if the lifecycle recovers from this error on its own
    pub fn is_retryable(&self) -> bool {
        matches!(self, TickerError::Transport(_))
    }

    /// Check if the error ends the connection until `connect()` is called again
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TickerError::ReconnectExhausted { .. } | TickerError::ClientClosed
        )
    }

    /// Create a malformed frame error for a buffer of `len` bytes
    pub fn malformed(len: usize, reason: impl Into<String>) -> Self {
        TickerError::MalformedFrame {
            len,
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for TickerError {
    fn from(err: serde_json::Error) -> Self {
        TickerError::Serialization(err.to_string())
    }
}

impl From<url::ParseError> for TickerError {
    fn from(err: url::ParseError) -> Self {
        TickerError::Config(format!("invalid socket url: {err}"))
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for TickerError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        TickerError::Transport(err.to_string())
    }
}

/// Result type alias for ticker operations
pub type Result<T> = std::result::Result<T, TickerError>;
