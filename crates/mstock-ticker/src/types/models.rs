/*
[INPUT]:  Decoded and normalized wire values
[OUTPUT]: Public tick records handed to callers
[POS]:    Data layer - market data model
[UPDATE]: When the venue packet layout gains or loses fields
*/

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::enums::{ExchangeSegment, Mode};

/// Venue identity of a traded instrument, unique within an exchange segment.
///
/// The venue sends tokens as text (`"22"`, `"99"`), so the token is kept as
/// text and only built from integers for convenience.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstrumentToken(String);

impl InstrumentToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstrumentToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InstrumentToken {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for InstrumentToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<u32> for InstrumentToken {
    fn from(value: u32) -> Self {
        Self(value.to_string())
    }
}

impl From<u64> for InstrumentToken {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

/// Open/high/low/close prices in rupees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Ohlc {
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
}

/// Side flag of a depth level as sent by the venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepthSide {
    Bid,
    Ask,
}

/// One price level of the market-depth ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthLevel {
    pub side: DepthSide,
    /// Raw side flag from the wire, kept for diagnostics.
    pub side_flag: i16,
    pub quantity: u64,
    pub price: Decimal,
    pub orders: i16,
}

/// Five best bids and five best asks.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MarketDepth {
    pub bids: Vec<DepthLevel>,
    pub asks: Vec<DepthLevel>,
}

/// Fields carried by quote and full packets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteData {
    pub last_traded_quantity: u64,
    pub average_price: Decimal,
    pub volume: u64,
    pub total_buy_quantity: Decimal,
    pub total_sell_quantity: Decimal,
    pub ohlc: Ohlc,
}

/// Fields carried only by full (snap) packets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullData {
    pub last_trade_timestamp: Option<DateTime<Utc>>,
    pub open_interest: u64,
    pub open_interest_change_percent: Decimal,
    pub depth: MarketDepth,
    pub upper_circuit_limit: Decimal,
    pub lower_circuit_limit: Decimal,
    pub week52_high: Decimal,
    pub week52_low: Decimal,
}

/// One market-data observation for one instrument.
///
/// `quote` is present for [`Mode::Quote`] and [`Mode::Full`] packets, `full`
/// only for [`Mode::Full`]. Prices are in rupees; a price of zero means the
/// venue had no value for the field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tick {
    pub mode: Mode,
    pub subscription_mode: u8,
    pub exchange_segment: ExchangeSegment,
    pub instrument_token: InstrumentToken,
    pub sequence_number: u64,
    pub exchange_timestamp: Option<DateTime<Utc>>,
    pub last_price: Decimal,
    pub quote: Option<QuoteData>,
    pub full: Option<FullData>,
}

impl Tick {
    pub fn depth(&self) -> Option<&MarketDepth> {
        self.full.as_ref().map(|full| &full.depth)
    }

    pub fn ohlc(&self) -> Option<&Ohlc> {
        self.quote.as_ref().map(|quote| &quote.ohlc)
    }
}

/// One registered subscription.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Subscription {
    pub segment: ExchangeSegment,
    pub token: InstrumentToken,
    pub mode: Mode,
}
