/*
[INPUT]:  TickerConfig, subscription calls, raw websocket frames
[OUTPUT]: Decoded ticks, control events and connection state
[POS]:    WebSocket layer - real-time market data stream
[UPDATE]: When adding new frame types or changing connection logic
*/

pub mod client;
pub mod decoder;
pub mod lifecycle;
pub mod message;
pub mod normalize;
pub mod registry;

pub use client::TickerClient;
pub use lifecycle::ConnectionState;
pub use message::{ControlFrame, InboundFrame, TickerEvent};
pub use registry::SubscriptionRegistry;
