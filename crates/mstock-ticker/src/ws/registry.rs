/*
[INPUT]:  subscribe/unsubscribe calls keyed by (exchange segment, token)
[OUTPUT]: Current subscription map and the control frames that express it
[POS]:    WebSocket layer - subscription bookkeeping that survives reconnects
[UPDATE]: When grouping rules or frame construction change
*/

use std::collections::BTreeMap;

use crate::types::{ExchangeSegment, InstrumentToken, Mode, Subscription, SubscriptionRequest, TokenGroup};

/// In-memory `(segment, token) -> mode` map.
///
/// Enumeration order is the key order of the underlying `BTreeMap`, so the
/// frames built from it are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionRegistry {
    entries: BTreeMap<(ExchangeSegment, InstrumentToken), Mode>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `tokens` at `mode`, replacing any previous mode for the same pair.
    ///
    /// Returns the subscribe frame for these tokens, or `None` for an empty list.
    pub fn subscribe(
        &mut self,
        segment: ExchangeSegment,
        tokens: &[InstrumentToken],
        mode: Mode,
    ) -> Option<SubscriptionRequest> {
        if tokens.is_empty() {
            return None;
        }
        for token in tokens {
            self.entries.insert((segment, token.clone()), mode);
        }
        Some(SubscriptionRequest::subscribe(
            mode,
            vec![TokenGroup::new(segment, tokens)],
        ))
    }

    /// Remove `tokens`. The frame carries `mode` in its params, as the venue
    /// expects a mode on every control frame.
    pub fn unsubscribe(
        &mut self,
        segment: ExchangeSegment,
        tokens: &[InstrumentToken],
        mode: Mode,
    ) -> Option<SubscriptionRequest> {
        if tokens.is_empty() {
            return None;
        }
        for token in tokens {
            self.entries.remove(&(segment, token.clone()));
        }
        Some(SubscriptionRequest::unsubscribe(
            mode,
            vec![TokenGroup::new(segment, tokens)],
        ))
    }

    /// One subscribe frame per mode; inside each frame one token group per segment.
    pub fn resubscribe_requests(&self) -> Vec<SubscriptionRequest> {
        let mut by_mode: BTreeMap<Mode, BTreeMap<ExchangeSegment, Vec<InstrumentToken>>> =
            BTreeMap::new();
        for ((segment, token), mode) in &self.entries {
            by_mode
                .entry(*mode)
                .or_default()
                .entry(*segment)
                .or_default()
                .push(token.clone());
        }

        by_mode
            .into_iter()
            .map(|(mode, segments)| {
                let groups = segments
                    .iter()
                    .map(|(segment, tokens)| TokenGroup::new(*segment, tokens))
                    .collect();
                SubscriptionRequest::subscribe(mode, groups)
            })
            .collect()
    }

    pub fn mode_of(&self, segment: ExchangeSegment, token: &InstrumentToken) -> Option<Mode> {
        self.entries.get(&(segment, token.clone())).copied()
    }

    pub fn snapshot(&self) -> Vec<Subscription> {
        self.entries
            .iter()
            .map(|((segment, token), mode)| Subscription {
                segment: *segment,
                token: token.clone(),
                mode: *mode,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(ids: &[u32]) -> Vec<InstrumentToken> {
        ids.iter().copied().map(InstrumentToken::from).collect()
    }

    #[test]
    fn subscribe_is_idempotent() {
        let mut once = SubscriptionRegistry::new();
        once.subscribe(ExchangeSegment::NseCash, &tokens(&[22, 99]), Mode::Quote);

        let mut twice = SubscriptionRegistry::new();
        twice.subscribe(ExchangeSegment::NseCash, &tokens(&[22, 99]), Mode::Quote);
        twice.subscribe(ExchangeSegment::NseCash, &tokens(&[22, 99]), Mode::Quote);

        assert_eq!(once, twice);
        assert_eq!(twice.len(), 2);
    }

    #[test]
    fn latest_subscribe_wins() {
        let mut registry = SubscriptionRegistry::new();
        let token = InstrumentToken::from(22u32);
        registry.subscribe(ExchangeSegment::NseCash, &[token.clone()], Mode::Ltp);
        registry.subscribe(ExchangeSegment::NseCash, &[token.clone()], Mode::Full);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.mode_of(ExchangeSegment::NseCash, &token), Some(Mode::Full));
    }

    #[test]
    fn same_token_in_two_segments_is_two_entries() {
        let mut registry = SubscriptionRegistry::new();
        registry.subscribe(ExchangeSegment::NseCash, &tokens(&[22]), Mode::Ltp);
        registry.subscribe(ExchangeSegment::BseCash, &tokens(&[22]), Mode::Quote);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn unsubscribe_removes_from_resubscribe() {
        let mut registry = SubscriptionRegistry::new();
        registry.subscribe(ExchangeSegment::NseCash, &tokens(&[22, 99]), Mode::Quote);
        registry.unsubscribe(ExchangeSegment::NseCash, &tokens(&[99]), Mode::Ltp);

        let requests = registry.resubscribe_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].params.token_list[0].tokens, vec!["22".to_string()]);
    }

    #[test]
    fn resubscribe_groups_by_mode_and_keeps_segments() {
        let mut registry = SubscriptionRegistry::new();
        registry.subscribe(ExchangeSegment::NseCash, &tokens(&[22, 99]), Mode::Quote);
        registry.subscribe(ExchangeSegment::NseFo, &tokens(&[35001]), Mode::Quote);
        registry.subscribe(ExchangeSegment::BseCash, &tokens(&[500325]), Mode::Ltp);

        let requests = registry.resubscribe_requests();
        assert_eq!(requests.len(), 2);
        assert!(requests.iter().all(SubscriptionRequest::is_subscribe));

        let quote = requests
            .iter()
            .find(|request| request.params.mode == Mode::Quote.code())
            .unwrap();
        assert_eq!(quote.params.token_list.len(), 2);
        assert_eq!(quote.params.token_list[0].exchange_type, 1);
        assert_eq!(quote.params.token_list[1].exchange_type, 2);
        assert_eq!(quote.token_count(), 3);

        let ltp = requests
            .iter()
            .find(|request| request.params.mode == Mode::Ltp.code())
            .unwrap();
        assert_eq!(ltp.params.token_list[0].exchange_type, 3);
    }

    #[test]
    fn empty_token_list_is_a_no_op() {
        let mut registry = SubscriptionRegistry::new();
        assert!(registry.subscribe(ExchangeSegment::NseCash, &[], Mode::Ltp).is_none());
        assert!(registry.unsubscribe(ExchangeSegment::NseCash, &[], Mode::Ltp).is_none());
        assert!(registry.is_empty());
        assert!(registry.resubscribe_requests().is_empty());
    }
}
