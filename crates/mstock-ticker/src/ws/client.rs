/*
[INPUT]:  TickerConfig (API key, access token, socket URL, tuning)
[OUTPUT]: TickerClient handle: commands in, TickerEvents and ConnectionState out
[POS]:    WebSocket layer - public streaming client surface
[UPDATE]: When adding client operations or changing the event channel
*/

use tokio::sync::{mpsc, oneshot, watch};
use tracing::debug;

use super::lifecycle::{Command, ConnectionState, LifecycleWorker};
use super::message::TickerEvent;
use crate::config::TickerConfig;
use crate::error::{Result, TickerError};
use crate::types::{ExchangeSegment, InstrumentToken, Mode, Subscription};

/// Handle to the streaming client.
///
/// Every operation is forwarded to a single worker task that owns the socket,
/// the keepalive and reconnect timers, and the subscription registry. Dropping
/// the handle closes the socket and stops the worker.
#[derive(Debug)]
pub struct TickerClient {
    config: TickerConfig,
    cmd_tx: mpsc::UnboundedSender<Command>,
    state_rx: watch::Receiver<ConnectionState>,
    event_rx: Option<mpsc::UnboundedReceiver<TickerEvent>>,
}

impl TickerClient {
    /// Validate `config` and spawn the worker on the current Tokio runtime.
    pub fn new(config: TickerConfig) -> Result<Self> {
        config.validate()?;
        let url = config.connection_url()?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            TickerError::Config("TickerClient must be created inside a Tokio runtime".to_string())
        })?;

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

        let worker = LifecycleWorker::new(config.clone(), url.to_string(), cmd_rx, event_tx, state_tx);
        runtime.spawn(worker.run());
        debug!(socket_url = %config.socket_url, "ticker client created");

        Ok(Self {
            config,
            cmd_tx,
            state_rx,
            event_rx: Some(event_rx),
        })
    }

    /// Get the event receiver. Only the first call returns `Some`.
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<TickerEvent>> {
        self.event_rx.take()
    }

    pub fn config(&self) -> &TickerConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Open the socket. A no-op while already connecting or open.
    pub fn connect(&self) -> Result<()> {
        self.send(Command::Connect)
    }

    /// Close the socket and cancel keepalive and any pending reconnect.
    /// Safe to call repeatedly.
    pub fn disconnect(&self) -> Result<()> {
        self.send(Command::Disconnect)
    }

    pub fn close(&self) -> Result<()> {
        self.disconnect()
    }

    /// Send `LOGIN:{access_token}`. Skipped with a warning unless open.
    pub fn send_login(&self) -> Result<()> {
        self.send(Command::SendLogin)
    }

    /// Record `tokens` under `segment` and send a subscribe frame when open.
    /// `None` uses the configured default mode.
    pub fn subscribe<I, T>(&self, segment: ExchangeSegment, tokens: I, mode: Option<Mode>) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: Into<InstrumentToken>,
    {
        self.send(Command::Subscribe {
            segment,
            tokens: collect_tokens(tokens),
            mode,
        })
    }

    /// Switch already subscribed tokens to another mode.
    pub fn set_mode<I, T>(&self, segment: ExchangeSegment, tokens: I, mode: Mode) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: Into<InstrumentToken>,
    {
        self.subscribe(segment, tokens, Some(mode))
    }

    pub fn unsubscribe<I, T>(&self, segment: ExchangeSegment, tokens: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: Into<InstrumentToken>,
    {
        self.send(Command::Unsubscribe {
            segment,
            tokens: collect_tokens(tokens),
        })
    }

    /// Replay every registered subscription, one frame per mode.
    pub fn resubscribe(&self) -> Result<()> {
        self.send(Command::Resubscribe)
    }

    /// Current registry contents in `(segment, token)` order.
    pub async fn subscriptions(&self) -> Result<Vec<Subscription>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Command::Snapshot(reply_tx))?;
        reply_rx.await.map_err(|_| TickerError::ClientClosed)
    }

    fn send(&self, cmd: Command) -> Result<()> {
        self.cmd_tx.send(cmd).map_err(|_| TickerError::ClientClosed)
    }
}

fn collect_tokens<I, T>(tokens: I) -> Vec<InstrumentToken>
where
    I: IntoIterator<Item = T>,
    T: Into<InstrumentToken>,
{
    tokens.into_iter().map(Into::into).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_requires_runtime() {
        let err = TickerClient::new(TickerConfig::new("key", "token")).unwrap_err();
        assert!(matches!(err, TickerError::Config(_)));
    }

    #[tokio::test]
    async fn new_rejects_invalid_config() {
        let err = TickerClient::new(TickerConfig::new("", "token")).unwrap_err();
        assert!(matches!(err, TickerError::Config(_)));
    }

    #[tokio::test]
    async fn starts_disconnected_with_single_event_receiver() {
        let mut client = TickerClient::new(TickerConfig::new("key", "token")).unwrap();
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert!(!client.is_connected());
        assert!(client.take_events().is_some());
        assert!(client.take_events().is_none());
    }

    #[tokio::test]
    async fn offline_subscriptions_are_recorded() {
        let client = TickerClient::new(TickerConfig::new("key", "token")).unwrap();
        client
            .subscribe(ExchangeSegment::NseCash, [22u32, 99], Some(Mode::Quote))
            .unwrap();
        client.subscribe(ExchangeSegment::BseCash, ["500325"], None).unwrap();
        client.unsubscribe(ExchangeSegment::NseCash, [99u32]).unwrap();

        let snapshot = client.subscriptions().await.unwrap();
        assert_eq!(
            snapshot,
            vec![
                Subscription {
                    segment: ExchangeSegment::NseCash,
                    token: InstrumentToken::from(22u32),
                    mode: Mode::Quote,
                },
                Subscription {
                    segment: ExchangeSegment::BseCash,
                    token: InstrumentToken::from("500325"),
                    mode: Mode::Ltp,
                },
            ]
        );
    }

    #[tokio::test]
    async fn disconnect_before_connect_is_harmless() {
        let client = TickerClient::new(TickerConfig::new("key", "token")).unwrap();
        client.disconnect().unwrap();
        client.disconnect().unwrap();
        assert!(client.subscriptions().await.unwrap().is_empty());
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }
}
