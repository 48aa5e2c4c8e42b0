/*
[INPUT]:  Raw binary websocket payloads
[OUTPUT]: RawTick records in venue wire units
[POS]:    WebSocket layer - binary packet decoding (pure, no I/O)
[UPDATE]: When the venue packet layout or packet lengths change
*/

//! Decoder for the venue's binary tick packets.
//!
//! The packet shape is selected by total buffer length alone: 51 bytes for
//! LTP, 123 for quote, 379 for full. Every other length is rejected so a
//! protocol change on the venue side surfaces as an error instead of being
//! decoded against the wrong layout.

use crate::error::{Result, TickerError};
use crate::types::Mode;

pub const LTP_PACKET_LEN: usize = 51;
pub const QUOTE_PACKET_LEN: usize = 123;
pub const FULL_PACKET_LEN: usize = 379;

/// Buffers shorter than this are keepalive noise.
pub const MIN_FRAME_LEN: usize = 2;

pub const DEPTH_LEVELS_PER_SIDE: usize = 5;
const DEPTH_RECORD_LEN: usize = 20;
const TOKEN_FIELD_LEN: usize = 25;

mod offset {
    pub const SUBSCRIPTION_MODE: usize = 0;
    pub const EXCHANGE_TYPE: usize = 1;
    pub const TOKEN: usize = 2;
    pub const SEQUENCE_NO: usize = 27;
    pub const EXCHANGE_TIMESTAMP: usize = 35;
    pub const LAST_PRICE: usize = 43;
    pub const LAST_TRADED_QTY: usize = 51;
    pub const AVG_TRADED_PRICE: usize = 59;
    pub const VOLUME: usize = 67;
    pub const TOTAL_BUY_QTY: usize = 75;
    pub const TOTAL_SELL_QTY: usize = 83;
    pub const OPEN: usize = 91;
    pub const HIGH: usize = 99;
    pub const LOW: usize = 107;
    pub const CLOSE: usize = 115;
    pub const LAST_TRADE_TIMESTAMP: usize = 123;
    pub const OPEN_INTEREST: usize = 131;
    pub const OPEN_INTEREST_CHANGE: usize = 139;
    pub const DEPTH: usize = 147;
    pub const UPPER_CIRCUIT: usize = 347;
    pub const LOWER_CIRCUIT: usize = 355;
    pub const WEEK52_HIGH: usize = 363;
    pub const WEEK52_LOW: usize = 371;
}

/// Tick exactly as it appears on the wire: prices in hundredths,
/// timestamps in seconds since the venue epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTick {
    pub mode: Mode,
    pub subscription_mode: u8,
    pub exchange_type: u8,
    pub instrument_token: String,
    pub sequence_number: u64,
    pub exchange_timestamp: u64,
    pub last_price: u64,
    pub quote: Option<RawQuote>,
    pub full: Option<RawFull>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawQuote {
    pub last_traded_quantity: u64,
    pub average_price: u64,
    pub volume: u64,
    pub total_buy_quantity: f64,
    pub total_sell_quantity: f64,
    pub open: u64,
    pub high: u64,
    pub low: u64,
    pub close: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawFull {
    pub last_trade_timestamp: u64,
    pub open_interest: u64,
    pub open_interest_change_percent: f64,
    pub bids: Vec<RawDepthLevel>,
    pub asks: Vec<RawDepthLevel>,
    pub upper_circuit_limit: u64,
    pub lower_circuit_limit: u64,
    pub week52_high: u64,
    pub week52_low: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawDepthLevel {
    pub side_flag: i16,
    pub quantity: u64,
    pub price: u64,
    pub orders: i16,
}

/// Packet shape implied by a buffer length, if any.
pub fn packet_mode(len: usize) -> Option<Mode> {
    match len {
        LTP_PACKET_LEN => Some(Mode::Ltp),
        QUOTE_PACKET_LEN => Some(Mode::Quote),
        FULL_PACKET_LEN => Some(Mode::Full),
        _ => None,
    }
}

/// Decode one binary frame into zero or more raw ticks.
///
/// Frames shorter than [`MIN_FRAME_LEN`] yield no ticks. Unknown lengths
/// return [`TickerError::MalformedFrame`].
pub fn decode(buf: &[u8]) -> Result<Vec<RawTick>> {
    if buf.len() < MIN_FRAME_LEN {
        return Ok(Vec::new());
    }

    let mode = packet_mode(buf.len()).ok_or_else(|| {
        TickerError::malformed(
            buf.len(),
            format!(
                "unknown packet length, expected {LTP_PACKET_LEN}, {QUOTE_PACKET_LEN} or {FULL_PACKET_LEN}"
            ),
        )
    })?;

    let subscription_mode = u8_at(buf, offset::SUBSCRIPTION_MODE)?;
    if Mode::from_code(subscription_mode) != Some(mode) {
        tracing::debug!(
            len = buf.len(),
            subscription_mode,
            packet_mode = %mode,
            "packet mode byte disagrees with packet length"
        );
    }

    let quote = match mode {
        Mode::Ltp => None,
        Mode::Quote | Mode::Full => Some(decode_quote(buf)?),
    };
    let full = match mode {
        Mode::Full => Some(decode_full(buf)?),
        Mode::Ltp | Mode::Quote => None,
    };

    Ok(vec![RawTick {
        mode,
        subscription_mode,
        exchange_type: u8_at(buf, offset::EXCHANGE_TYPE)?,
        instrument_token: token_at(buf, offset::TOKEN)?,
        sequence_number: u64_at(buf, offset::SEQUENCE_NO)?,
        exchange_timestamp: u64_at(buf, offset::EXCHANGE_TIMESTAMP)?,
        last_price: u64_at(buf, offset::LAST_PRICE)?,
        quote,
        full,
    }])
}

fn decode_quote(buf: &[u8]) -> Result<RawQuote> {
    Ok(RawQuote {
        last_traded_quantity: u64_at(buf, offset::LAST_TRADED_QTY)?,
        average_price: u64_at(buf, offset::AVG_TRADED_PRICE)?,
        volume: u64_at(buf, offset::VOLUME)?,
        total_buy_quantity: f64_at(buf, offset::TOTAL_BUY_QTY)?,
        total_sell_quantity: f64_at(buf, offset::TOTAL_SELL_QTY)?,
        open: u64_at(buf, offset::OPEN)?,
        high: u64_at(buf, offset::HIGH)?,
        low: u64_at(buf, offset::LOW)?,
        close: u64_at(buf, offset::CLOSE)?,
    })
}

fn decode_full(buf: &[u8]) -> Result<RawFull> {
    let mut bids = Vec::with_capacity(DEPTH_LEVELS_PER_SIDE);
    let mut asks = Vec::with_capacity(DEPTH_LEVELS_PER_SIDE);

    for level in 0..DEPTH_LEVELS_PER_SIDE * 2 {
        let base = offset::DEPTH + level * DEPTH_RECORD_LEN;
        let record = RawDepthLevel {
            side_flag: i16_at(buf, base)?,
            quantity: u64_at(buf, base + 2)?,
            price: u64_at(buf, base + 10)?,
            orders: i16_at(buf, base + 18)?,
        };
        if level < DEPTH_LEVELS_PER_SIDE {
            bids.push(record);
        } else {
            asks.push(record);
        }
    }

    Ok(RawFull {
        last_trade_timestamp: u64_at(buf, offset::LAST_TRADE_TIMESTAMP)?,
        open_interest: u64_at(buf, offset::OPEN_INTEREST)?,
        open_interest_change_percent: f64_at(buf, offset::OPEN_INTEREST_CHANGE)?,
        bids,
        asks,
        upper_circuit_limit: u64_at(buf, offset::UPPER_CIRCUIT)?,
        lower_circuit_limit: u64_at(buf, offset::LOWER_CIRCUIT)?,
        week52_high: u64_at(buf, offset::WEEK52_HIGH)?,
        week52_low: u64_at(buf, offset::WEEK52_LOW)?,
    })
}

fn field<const N: usize>(buf: &[u8], at: usize) -> Result<[u8; N]> {
    buf.get(at..at + N)
        .and_then(|bytes| <[u8; N]>::try_from(bytes).ok())
        .ok_or_else(|| TickerError::malformed(buf.len(), format!("field at offset {at} out of bounds")))
}

fn u8_at(buf: &[u8], at: usize) -> Result<u8> {
    Ok(field::<1>(buf, at)?[0])
}

fn i16_at(buf: &[u8], at: usize) -> Result<i16> {
    field(buf, at).map(i16::from_le_bytes)
}

// Equivalent to combining two little-endian 32-bit halves as high * 2^32 + low.
fn u64_at(buf: &[u8], at: usize) -> Result<u64> {
    field(buf, at).map(u64::from_le_bytes)
}

fn f64_at(buf: &[u8], at: usize) -> Result<f64> {
    field(buf, at).map(f64::from_le_bytes)
}

fn token_at(buf: &[u8], at: usize) -> Result<String> {
    let bytes = field::<TOKEN_FIELD_LEN>(buf, at)?;
    Ok(String::from_utf8_lossy(&bytes).replace('\0', "").trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(len: usize, mode: u8, token: &str, last_price: u64) -> Vec<u8> {
        let mut buf = vec![0u8; len];
        buf[0] = mode;
        buf[1] = 1;
        buf[2..2 + token.len()].copy_from_slice(token.as_bytes());
        buf[27..35].copy_from_slice(&7u64.to_le_bytes());
        buf[35..43].copy_from_slice(&1_000u64.to_le_bytes());
        buf[43..51].copy_from_slice(&last_price.to_le_bytes());
        buf
    }

    #[test]
    fn decodes_ltp_packet() {
        let ticks = decode(&header(LTP_PACKET_LEN, 1, "22", 250_050)).unwrap();
        assert_eq!(ticks.len(), 1);

        let tick = &ticks[0];
        assert_eq!(tick.mode, Mode::Ltp);
        assert_eq!(tick.exchange_type, 1);
        assert_eq!(tick.instrument_token, "22");
        assert_eq!(tick.sequence_number, 7);
        assert_eq!(tick.exchange_timestamp, 1_000);
        assert_eq!(tick.last_price, 250_050);
        assert!(tick.quote.is_none());
        assert!(tick.full.is_none());
    }

    #[test]
    fn reads_64_bit_fields_from_both_halves() {
        let mut buf = header(LTP_PACKET_LEN, 1, "22", 0);
        buf[43..47].copy_from_slice(&5u32.to_le_bytes());
        buf[47..51].copy_from_slice(&2u32.to_le_bytes());

        let ticks = decode(&buf).unwrap();
        assert_eq!(ticks[0].last_price, 2 * (1u64 << 32) + 5);
    }

    #[test]
    fn decodes_depth_split_into_bids_and_asks() {
        let mut buf = header(FULL_PACKET_LEN, 3, "99", 100);
        for level in 0..10usize {
            let base = 147 + level * 20;
            let flag: i16 = if level < 5 { 66 } else { 83 };
            buf[base..base + 2].copy_from_slice(&flag.to_le_bytes());
            buf[base + 2..base + 10].copy_from_slice(&(level as u64 + 1).to_le_bytes());
            buf[base + 10..base + 18].copy_from_slice(&(10_000 + level as u64).to_le_bytes());
            buf[base + 18..base + 20].copy_from_slice(&(level as i16).to_le_bytes());
        }

        let ticks = decode(&buf).unwrap();
        let full = ticks[0].full.as_ref().unwrap();
        assert_eq!(full.bids.len(), 5);
        assert_eq!(full.asks.len(), 5);
        assert_eq!(full.bids[0].side_flag, 66);
        assert_eq!(full.bids[0].quantity, 1);
        assert_eq!(full.asks[0].side_flag, 83);
        assert_eq!(full.asks[4].price, 10_009);
        assert_eq!(full.asks[4].orders, 9);
    }

    #[test]
    fn short_frames_are_ignored() {
        assert!(decode(&[]).unwrap().is_empty());
        assert!(decode(&[1]).unwrap().is_empty());
    }

    #[test]
    fn unknown_length_is_malformed() {
        let err = decode(&[0u8; 47]).unwrap_err();
        assert!(matches!(err, TickerError::MalformedFrame { len: 47, .. }));
    }

    #[test]
    fn token_field_trims_nul_padding() {
        let buf = header(LTP_PACKET_LEN, 1, "  2885", 1);
        assert_eq!(decode(&buf).unwrap()[0].instrument_token, "2885");
    }

    #[test]
    fn token_field_drops_interior_nul_bytes() {
        let buf = header(LTP_PACKET_LEN, 1, "22\099", 1);
        assert_eq!(decode(&buf).unwrap()[0].instrument_token, "2299");
    }
}
