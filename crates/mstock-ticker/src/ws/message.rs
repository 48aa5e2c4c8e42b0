/*
[INPUT]:  Raw websocket payload bytes (text or binary)
[OUTPUT]: TickerEvent values: ticks, order/trade updates, venue errors
[POS]:    WebSocket layer - frame classification and routing
[UPDATE]: When adding new control messages or changing the text/binary sniff
*/

use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{decoder, normalize};
use crate::error::TickerError;
use crate::types::Tick;

const MESSAGE_SAMPLE_LIMIT: usize = 3;
const OTHER_LOG_LIMIT: usize = 3;
const PARSE_FAIL_LOG_LIMIT: usize = 3;
const RAW_LOG_MAX_BYTES: usize = 1024;

static MESSAGE_SAMPLE_COUNT: AtomicUsize = AtomicUsize::new(0);
static OTHER_LOG_COUNT: AtomicUsize = AtomicUsize::new(0);
static PARSE_FAIL_LOG_COUNT: AtomicUsize = AtomicUsize::new(0);

/// Everything the client reports to its consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum TickerEvent {
    /// Socket reached `Open`; registry replay (if enabled) was already sent.
    Connected,
    /// Ticks decoded from one binary frame.
    Ticks(Vec<Tick>),
    OrderUpdate(serde_json::Value),
    TradeUpdate(serde_json::Value),
    Error(TickerError),
    /// An open socket closed. `code` is the websocket close code when known.
    Closed { code: Option<u16>, reason: String },
}

/// JSON control frame pushed by the venue.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ControlFrame {
    #[serde(default)]
    pub order_status: Option<String>,
    #[serde(default, rename = "orderData")]
    pub order_data: Option<serde_json::Value>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl ControlFrame {
    /// Pick the routing fields out of any JSON value. A field with an
    /// unexpected type reads as absent.
    pub fn from_value(value: &serde_json::Value) -> Self {
        let text = |key: &str| value.get(key).and_then(serde_json::Value::as_str).map(str::to_string);
        Self {
            order_status: text("order_status"),
            order_data: value.get("orderData").cloned(),
            kind: text("type"),
            data: value.get("data").cloned(),
        }
    }
}

/// Result of sniffing one payload.
#[derive(Debug)]
pub enum InboundFrame<'a> {
    /// Too short to carry anything.
    Noise,
    Control(ControlFrame),
    Binary(&'a [u8]),
}

/// Text sniff before binary decode: only a payload whose first character is
/// `{` is tried as JSON, and a failed parse falls through to the decoder.
pub fn classify(payload: &[u8]) -> InboundFrame<'_> {
    if payload.len() < decoder::MIN_FRAME_LEN {
        return InboundFrame::Noise;
    }

    if payload.first() == Some(&b'{') {
        match serde_json::from_slice::<serde_json::Value>(payload) {
            Ok(value) => return InboundFrame::Control(ControlFrame::from_value(&value)),
            Err(err) => log_parse_fail_once(&err, payload),
        }
    }

    InboundFrame::Binary(payload)
}

/// Route a control frame. Each rule is checked independently.
pub fn route_control(frame: ControlFrame) -> Vec<TickerEvent> {
    let mut events = Vec::new();

    if let Some(order_data) = frame.order_data {
        match frame.order_status.as_deref() {
            Some("order") => events.push(TickerEvent::OrderUpdate(order_data)),
            Some("trade") => events.push(TickerEvent::TradeUpdate(order_data)),
            _ => {}
        }
    }

    if frame.kind.as_deref() == Some("error") {
        let message = match frame.data {
            Some(serde_json::Value::String(message)) => message,
            Some(other) => other.to_string(),
            None => "unspecified venue error".to_string(),
        };
        events.push(TickerEvent::Error(TickerError::Protocol(message)));
    }

    if events.is_empty() {
        log_other_message_once(frame.kind.as_deref(), frame.order_status.as_deref());
    }

    events
}

/// Turn one inbound payload into the events it produces.
///
/// A decode failure becomes a single `Error` event; nothing here touches
/// connection state.
pub fn process_payload(payload: &[u8]) -> Vec<TickerEvent> {
    match classify(payload) {
        InboundFrame::Noise => Vec::new(),
        InboundFrame::Control(frame) => route_control(frame),
        InboundFrame::Binary(bytes) => match decoder::decode(bytes) {
            Ok(raw) if raw.is_empty() => Vec::new(),
            Ok(raw) => {
                let ticks = normalize::normalize_all(raw);
                log_message_sample_once(&ticks);
                vec![TickerEvent::Ticks(ticks)]
            }
            Err(err) => vec![TickerEvent::Error(err)],
        },
    }
}

fn log_message_sample_once(ticks: &[Tick]) {
    let count = MESSAGE_SAMPLE_COUNT.fetch_add(1, Ordering::Relaxed);
    if count >= MESSAGE_SAMPLE_LIMIT {
        return;
    }

    if let Some(tick) = ticks.first() {
        info!(
            sample_index = count + 1,
            sample_limit = MESSAGE_SAMPLE_LIMIT,
            mode = %tick.mode,
            segment = %tick.exchange_segment,
            token = %tick.instrument_token,
            last_price = %tick.last_price,
            "ws tick sample"
        );
    }
}

fn log_other_message_once(kind: Option<&str>, order_status: Option<&str>) {
    let count = OTHER_LOG_COUNT.fetch_add(1, Ordering::Relaxed);
    if count < OTHER_LOG_LIMIT {
        debug!(
            sample_index = count + 1,
            sample_limit = OTHER_LOG_LIMIT,
            kind = kind.unwrap_or("none"),
            order_status = order_status.unwrap_or("none"),
            "ws control message unrecognized"
        );
    }
}

fn log_parse_fail_once(err: &serde_json::Error, raw: &[u8]) {
    let count = PARSE_FAIL_LOG_COUNT.fetch_add(1, Ordering::Relaxed);
    if count < PARSE_FAIL_LOG_LIMIT {
        info!(
            sample_index = count + 1,
            sample_limit = PARSE_FAIL_LOG_LIMIT,
            error = %err,
            bytes = raw.len(),
            "ws text sniff failed, decoding as binary"
        );
        let preview = truncate_for_log(&String::from_utf8_lossy(raw), RAW_LOG_MAX_BYTES);
        debug!(
            sample_index = count + 1,
            sample_limit = PARSE_FAIL_LOG_LIMIT,
            message = %preview,
            "ws text sniff failed, decoding as binary"
        );
    }
}

pub(crate) fn truncate_for_log(value: &str, max_len: usize) -> String {
    if value.len() <= max_len {
        return value.to_string();
    }
    let mut end = max_len;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    let mut out = String::with_capacity(end + 3);
    out.push_str(&value[..end]);
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn order_update_is_routed() {
        let payload = json!({"order_status": "order", "orderData": {"order_id": "1"}}).to_string();
        let events = process_payload(payload.as_bytes());
        assert_eq!(events, vec![TickerEvent::OrderUpdate(json!({"order_id": "1"}))]);
    }

    #[test]
    fn trade_update_is_routed() {
        let payload = json!({"order_status": "trade", "orderData": {"qty": 5}}).to_string();
        let events = process_payload(payload.as_bytes());
        assert_eq!(events, vec![TickerEvent::TradeUpdate(json!({"qty": 5}))]);
    }

    #[test]
    fn venue_error_becomes_protocol_error() {
        let payload = json!({"type": "error", "data": "invalid token"}).to_string();
        let events = process_payload(payload.as_bytes());
        assert_eq!(
            events,
            vec![TickerEvent::Error(TickerError::Protocol("invalid token".to_string()))]
        );
    }

    #[test]
    fn unknown_control_message_is_dropped() {
        let payload = json!({"type": "heartbeat"}).to_string();
        assert!(process_payload(payload.as_bytes()).is_empty());
    }

    #[test]
    fn json_with_unexpected_field_types_is_dropped_quietly() {
        let payload = br#"{"type":1,"data":"hello"}"#;
        assert!(matches!(classify(payload), InboundFrame::Control(_)));
        assert!(process_payload(payload).is_empty());

        let payload = json!({"order_status": 5, "orderData": {"id": 1}}).to_string();
        assert!(process_payload(payload.as_bytes()).is_empty());
    }

    #[test]
    fn noise_is_ignored() {
        assert!(matches!(classify(b"{"), InboundFrame::Noise));
        assert!(process_payload(&[]).is_empty());
    }

    #[test]
    fn broken_json_falls_through_to_binary() {
        let payload = b"{not json at all";
        assert!(matches!(classify(payload), InboundFrame::Binary(_)));
        let events = process_payload(payload);
        assert!(matches!(
            events.as_slice(),
            [TickerEvent::Error(TickerError::MalformedFrame { len: 16, .. })]
        ));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_for_log("abcdef", 3), "abc...");
        assert_eq!(truncate_for_log("ab", 3), "ab");
        assert_eq!(truncate_for_log("aé", 2), "a...");
    }
}
