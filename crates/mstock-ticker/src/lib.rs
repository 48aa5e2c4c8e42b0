/*
[INPUT]:  Crate modules and public type definitions
[OUTPUT]: Public mStock ticker crate surface
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

pub mod config;
pub mod error;
pub mod types;
pub mod ws;

pub use config::TickerConfig;
pub use error::{Result, TickerError};

// Re-export all types
pub use types::*;

// Re-export commonly used types from ws
pub use ws::{ConnectionState, SubscriptionRegistry, TickerClient, TickerEvent};
