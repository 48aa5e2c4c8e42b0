/*
[INPUT]:  Venue mode and exchange-segment constants
[OUTPUT]: Typed Rust enums with wire codes and serde support
[POS]:    Data layer - type definitions for venue communication
[UPDATE]: When the venue adds segments or modes
*/

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TickerError;

/// Requested level of detail for a subscription.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Ltp,
    Quote,
    #[serde(alias = "snap")]
    Full,
}

impl Mode {
    /// Wire code used in subscription frames.
    pub fn code(self) -> u8 {
        match self {
            Mode::Ltp => 1,
            Mode::Quote => 2,
            Mode::Full => 3,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Mode::Ltp),
            2 => Some(Mode::Quote),
            3 => Some(Mode::Full),
            _ => None,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Ltp => "ltp",
            Mode::Quote => "quote",
            Mode::Full => "full",
        };
        f.write_str(name)
    }
}

impl FromStr for Mode {
    type Err = TickerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ltp" => Ok(Mode::Ltp),
            "quote" => Ok(Mode::Quote),
            "full" | "snap" => Ok(Mode::Full),
            other => Err(TickerError::Config(format!("unknown mode: {other}"))),
        }
    }
}

/// Exchange segment an instrument token belongs to.
///
/// Codes the venue sends that have no named variant are kept as `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ExchangeSegment {
    NseCash,
    NseFo,
    BseCash,
    BseFo,
    NseCurrency,
    Other(u8),
}

impl ExchangeSegment {
    pub fn code(self) -> u8 {
        match self {
            ExchangeSegment::NseCash => 1,
            ExchangeSegment::NseFo => 2,
            ExchangeSegment::BseCash => 3,
            ExchangeSegment::BseFo => 4,
            ExchangeSegment::NseCurrency => 13,
            ExchangeSegment::Other(code) => code,
        }
    }

    pub fn from_code(code: u8) -> Self {
        match code {
            1 => ExchangeSegment::NseCash,
            2 => ExchangeSegment::NseFo,
            3 => ExchangeSegment::BseCash,
            4 => ExchangeSegment::BseFo,
            13 => ExchangeSegment::NseCurrency,
            other => ExchangeSegment::Other(other),
        }
    }

    /// Short venue name (`nsecm`, `nsefo`, ...).
    pub fn name(self) -> String {
        match self {
            ExchangeSegment::NseCash => "nsecm".to_string(),
            ExchangeSegment::NseFo => "nsefo".to_string(),
            ExchangeSegment::BseCash => "bsecm".to_string(),
            ExchangeSegment::BseFo => "bsefo".to_string(),
            ExchangeSegment::NseCurrency => "nsecd".to_string(),
            ExchangeSegment::Other(code) => code.to_string(),
        }
    }
}

impl fmt::Display for ExchangeSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl FromStr for ExchangeSegment {
    type Err = TickerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        match name.as_str() {
            "nsecm" => Ok(ExchangeSegment::NseCash),
            "nsefo" => Ok(ExchangeSegment::NseFo),
            "bsecm" => Ok(ExchangeSegment::BseCash),
            "bsefo" => Ok(ExchangeSegment::BseFo),
            "nsecd" => Ok(ExchangeSegment::NseCurrency),
            other => other
                .parse::<u8>()
                .map(ExchangeSegment::from_code)
                .map_err(|_| TickerError::Config(format!("unknown exchange segment: {other}"))),
        }
    }
}

impl TryFrom<String> for ExchangeSegment {
    type Error = TickerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ExchangeSegment> for String {
    fn from(value: ExchangeSegment) -> Self {
        value.name()
    }
}

/// Subscribe/unsubscribe action codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionAction {
    Unsubscribe,
    Subscribe,
}

impl SubscriptionAction {
    pub fn code(self) -> u8 {
        match self {
            SubscriptionAction::Unsubscribe => 0,
            SubscriptionAction::Subscribe => 1,
        }
    }
}
