/*
[INPUT]:  Test configuration and mock venue requirements
[OUTPUT]: Shared test utilities, packet fixtures, and a local websocket venue
[POS]:    Test infrastructure - shared across all test modules
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for mstock-ticker tests

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::StreamExt;
use mstock_ticker::{ConnectionState, TickerClient, TickerConfig, TickerEvent};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};

pub const TEST_API_KEY: &str = "test-key";
pub const TEST_ACCESS_TOKEN: &str = "test-token";
pub const WAIT: Duration = Duration::from_secs(5);

pub type VenueSocket = WebSocketStream<TcpStream>;

/// Local websocket endpoint standing in for the venue.
pub struct MockVenue {
    listener: TcpListener,
    addr: SocketAddr,
}

impl MockVenue {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock venue");
        let addr = listener.local_addr().expect("mock venue addr");
        Self { listener, addr }
    }

    pub fn socket_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Accept the next client and complete the websocket handshake.
    pub async fn accept(&self) -> VenueSocket {
        let (stream, _) = timeout(WAIT, self.listener.accept())
            .await
            .expect("timed out waiting for client")
            .expect("accept client");
        accept_async(stream).await.expect("websocket handshake")
    }

    /// True when no client connects within `within`.
    pub async fn stays_quiet(&self, within: Duration) -> bool {
        timeout(within, self.listener.accept()).await.is_err()
    }
}

/// Config pointed at `socket_url` with fast reconnects and no pings during a test.
pub fn test_config(socket_url: &str) -> TickerConfig {
    TickerConfig::new(TEST_API_KEY, TEST_ACCESS_TOKEN)
        .with_socket_url(socket_url)
        .with_max_reconnect_attempts(3)
        .with_reconnect_delay(Duration::from_millis(20))
        .with_ping_interval(Duration::from_secs(60))
}

pub fn client_with_events(config: TickerConfig) -> (TickerClient, mpsc::UnboundedReceiver<TickerEvent>) {
    let mut client = TickerClient::new(config).expect("client");
    let events = client.take_events().expect("event receiver");
    (client, events)
}

/// Next text frame the venue receives, skipping control frames.
pub async fn next_text(ws: &mut VenueSocket) -> String {
    try_next_text(ws, WAIT).await.expect("expected a text frame")
}

pub async fn try_next_text(ws: &mut VenueSocket, within: Duration) -> Option<String> {
    let deadline = tokio::time::Instant::now() + within;
    loop {
        let message = tokio::time::timeout_at(deadline, ws.next()).await.ok()??.ok()?;
        match message {
            Message::Text(text) => return Some(text.as_str().to_string()),
            Message::Ping(_) | Message::Pong(_) => continue,
            _ => return None,
        }
    }
}

/// Count websocket pings the venue receives during `window`.
pub async fn count_pings(ws: &mut VenueSocket, window: Duration) -> usize {
    let deadline = tokio::time::Instant::now() + window;
    let mut pings = 0;
    loop {
        match tokio::time::timeout_at(deadline, ws.next()).await {
            Ok(Some(Ok(Message::Ping(_)))) => pings += 1,
            Ok(Some(Ok(_))) => {}
            Ok(Some(Err(_))) | Ok(None) | Err(_) => return pings,
        }
    }
}

pub async fn next_event(events: &mut mpsc::UnboundedReceiver<TickerEvent>) -> TickerEvent {
    timeout(WAIT, events.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

/// Skip events until one matches `predicate`.
pub async fn wait_for_event<F>(events: &mut mpsc::UnboundedReceiver<TickerEvent>, predicate: F) -> TickerEvent
where
    F: Fn(&TickerEvent) -> bool,
{
    loop {
        let event = next_event(events).await;
        if predicate(&event) {
            return event;
        }
    }
}

pub async fn wait_for_state(client: &TickerClient, expected: ConnectionState) {
    let mut state = client.watch_state();
    timeout(WAIT, state.wait_for(|current| *current == expected))
        .await
        .expect("timed out waiting for state")
        .expect("state channel closed");
}

pub fn drain(events: &mut mpsc::UnboundedReceiver<TickerEvent>) -> Vec<TickerEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

/// Packet header shared by every shape: mode, segment, token, sequence,
/// exchange timestamp, last price.
pub fn packet(len: usize, mode: u8, segment: u8, token: &str, last_price: u64) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    buf[0] = mode;
    buf[1] = segment;
    buf[2..2 + token.len()].copy_from_slice(token.as_bytes());
    buf[27..35].copy_from_slice(&42u64.to_le_bytes());
    buf[35..43].copy_from_slice(&86_400u64.to_le_bytes());
    buf[43..51].copy_from_slice(&last_price.to_le_bytes());
    buf
}

pub fn ltp_packet(segment: u8, token: &str, last_price: u64) -> Vec<u8> {
    packet(51, 1, segment, token, last_price)
}

pub fn put_u64(buf: &mut [u8], at: usize, value: u64) {
    buf[at..at + 8].copy_from_slice(&value.to_le_bytes());
}

pub fn put_f64(buf: &mut [u8], at: usize, value: f64) {
    buf[at..at + 8].copy_from_slice(&value.to_le_bytes());
}
