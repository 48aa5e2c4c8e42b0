/*
[INPUT]:  Subscription changes and credentials
[OUTPUT]: Outbound control frames in venue wire format
[POS]:    Data layer - outbound websocket payloads
[UPDATE]: When the venue control frame format changes
*/

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{ExchangeSegment, Mode, SubscriptionAction};
use super::models::InstrumentToken;

const CORRELATION_ID_LEN: usize = 10;

/// Subscribe/unsubscribe control frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRequest {
    #[serde(rename = "correlationID")]
    pub correlation_id: String,
    pub action: u8,
    pub params: SubscriptionParams,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionParams {
    pub mode: u8,
    #[serde(rename = "tokenList")]
    pub token_list: Vec<TokenGroup>,
}

/// Tokens of a single exchange segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenGroup {
    #[serde(rename = "exchangeType")]
    pub exchange_type: u8,
    pub tokens: Vec<String>,
}

impl TokenGroup {
    pub fn new(segment: ExchangeSegment, tokens: &[InstrumentToken]) -> Self {
        Self {
            exchange_type: segment.code(),
            tokens: tokens.iter().map(|token| token.as_str().to_string()).collect(),
        }
    }
}

impl SubscriptionRequest {
    pub fn new(action: SubscriptionAction, mode: Mode, token_list: Vec<TokenGroup>) -> Self {
        Self {
            correlation_id: new_correlation_id(),
            action: action.code(),
            params: SubscriptionParams {
                mode: mode.code(),
                token_list,
            },
        }
    }

    pub fn subscribe(mode: Mode, token_list: Vec<TokenGroup>) -> Self {
        Self::new(SubscriptionAction::Subscribe, mode, token_list)
    }

    pub fn unsubscribe(mode: Mode, token_list: Vec<TokenGroup>) -> Self {
        Self::new(SubscriptionAction::Unsubscribe, mode, token_list)
    }

    pub fn is_subscribe(&self) -> bool {
        self.action == SubscriptionAction::Subscribe.code()
    }

    /// Number of tokens across all segment groups.
    pub fn token_count(&self) -> usize {
        self.params.token_list.iter().map(|group| group.tokens.len()).sum()
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Plain-text login frame, `LOGIN:{accessToken}`.
pub fn login_frame(access_token: &str) -> String {
    format!("LOGIN:{access_token}")
}

fn new_correlation_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(CORRELATION_ID_LEN);
    id
}
