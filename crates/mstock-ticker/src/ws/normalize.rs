/*
[INPUT]:  RawTick records in venue wire units
[OUTPUT]: Public Tick records with decimal prices and UTC timestamps
[POS]:    WebSocket layer - price/field normalization
[UPDATE]: When price scaling or timestamp origin changes
*/

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;

use super::decoder::{RawDepthLevel, RawFull, RawQuote, RawTick};
use crate::types::{
    DepthLevel, DepthSide, ExchangeSegment, FullData, InstrumentToken, MarketDepth, Ohlc,
    QuoteData, Tick,
};

/// Wire prices are integers in hundredths of a rupee.
const PRICE_SCALE: u32 = 2;

/// 1980-01-01T00:00:00Z as a unix timestamp.
pub const VENUE_EPOCH_UNIX_SECS: i64 = 315_532_800;

/// Convert a raw price to rupees. Zero is the venue's "no value" and stays zero.
pub fn price_from_raw(raw: u64) -> Decimal {
    if raw == 0 {
        return Decimal::ZERO;
    }
    Decimal::from_i128_with_scale(i128::from(raw), PRICE_SCALE)
}

/// Convert venue-epoch seconds to UTC. Zero means unset.
pub fn timestamp_from_venue_epoch(secs: u64) -> Option<DateTime<Utc>> {
    if secs == 0 {
        return None;
    }
    let secs = i64::try_from(secs).ok()?;
    DateTime::from_timestamp(VENUE_EPOCH_UNIX_SECS.checked_add(secs)?, 0)
}

fn decimal_from_f64(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or(Decimal::ZERO)
}

pub fn normalize(raw: RawTick) -> Tick {
    Tick {
        mode: raw.mode,
        subscription_mode: raw.subscription_mode,
        exchange_segment: ExchangeSegment::from_code(raw.exchange_type),
        instrument_token: InstrumentToken::new(raw.instrument_token),
        sequence_number: raw.sequence_number,
        exchange_timestamp: timestamp_from_venue_epoch(raw.exchange_timestamp),
        last_price: price_from_raw(raw.last_price),
        quote: raw.quote.map(normalize_quote),
        full: raw.full.map(normalize_full),
    }
}

pub fn normalize_all(raw: Vec<RawTick>) -> Vec<Tick> {
    raw.into_iter().map(normalize).collect()
}

fn normalize_quote(raw: RawQuote) -> QuoteData {
    QuoteData {
        last_traded_quantity: raw.last_traded_quantity,
        average_price: price_from_raw(raw.average_price),
        volume: raw.volume,
        total_buy_quantity: decimal_from_f64(raw.total_buy_quantity),
        total_sell_quantity: decimal_from_f64(raw.total_sell_quantity),
        ohlc: Ohlc {
            open: price_from_raw(raw.open),
            high: price_from_raw(raw.high),
            low: price_from_raw(raw.low),
            close: price_from_raw(raw.close),
        },
    }
}

fn normalize_full(raw: RawFull) -> FullData {
    FullData {
        last_trade_timestamp: timestamp_from_venue_epoch(raw.last_trade_timestamp),
        open_interest: raw.open_interest,
        open_interest_change_percent: decimal_from_f64(raw.open_interest_change_percent),
        depth: MarketDepth {
            bids: raw.bids.iter().map(|level| depth_level(level, DepthSide::Bid)).collect(),
            asks: raw.asks.iter().map(|level| depth_level(level, DepthSide::Ask)).collect(),
        },
        upper_circuit_limit: price_from_raw(raw.upper_circuit_limit),
        lower_circuit_limit: price_from_raw(raw.lower_circuit_limit),
        week52_high: price_from_raw(raw.week52_high),
        week52_low: price_from_raw(raw.week52_low),
    }
}

fn depth_level(raw: &RawDepthLevel, side: DepthSide) -> DepthLevel {
    DepthLevel {
        side,
        side_flag: raw.side_flag,
        quantity: raw.quantity,
        price: price_from_raw(raw.price),
        orders: raw.orders,
    }
}
