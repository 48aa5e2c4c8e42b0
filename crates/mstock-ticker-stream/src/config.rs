/*
[INPUT]:  YAML configuration file
[OUTPUT]: Parsed stream configuration (ticker settings + subscriptions)
[POS]:    Configuration layer - stream setup
[UPDATE]: When adding new configuration options
*/

use std::path::Path;

use anyhow::{Context, bail};
use mstock_ticker::{ExchangeSegment, InstrumentToken, Mode, TickerConfig};
use serde::{Deserialize, Serialize};

/// Top-level configuration for the tick streamer
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamConfig {
    /// Credentials and connection tuning
    pub ticker: TickerConfig,
    /// Instruments to subscribe after login
    #[serde(default)]
    pub subscriptions: Vec<SubscriptionConfig>,
    /// Send `LOGIN:{token}` on every connect
    #[serde(default = "default_login")]
    pub login: bool,
}

/// One group of instruments in a single segment
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubscriptionConfig {
    /// Segment name (`nsecm`, `nsefo`, ...) or numeric code
    pub segment: ExchangeSegment,
    /// Instrument tokens; numbers and strings are both accepted
    pub tokens: Vec<TokenValue>,
    /// Falls back to `ticker.default_mode`
    #[serde(default)]
    pub mode: Option<Mode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum TokenValue {
    Number(u64),
    Text(String),
}

impl From<&TokenValue> for InstrumentToken {
    fn from(value: &TokenValue) -> Self {
        match value {
            TokenValue::Number(token) => InstrumentToken::from(*token),
            TokenValue::Text(token) => InstrumentToken::new(token.trim()),
        }
    }
}

impl SubscriptionConfig {
    pub fn instrument_tokens(&self) -> Vec<InstrumentToken> {
        self.tokens.iter().map(InstrumentToken::from).collect()
    }
}

fn default_login() -> bool {
    true
}

impl StreamConfig {
    /// Load configuration from YAML file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let config: Self = serde_yaml::from_str(content).context("parse yaml")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.ticker.validate().context("invalid ticker section")?;
        for (index, subscription) in self.subscriptions.iter().enumerate() {
            if subscription.tokens.is_empty() {
                bail!("subscription {index} ({}) lists no tokens", subscription.segment);
            }
        }
        Ok(())
    }

    pub fn token_count(&self) -> usize {
        self.subscriptions.iter().map(|subscription| subscription.tokens.len()).sum()
    }
}
