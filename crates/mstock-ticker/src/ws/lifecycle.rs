/*
[INPUT]:  Commands from TickerClient, websocket frames from the venue
[OUTPUT]: Outbound control frames, TickerEvents, ConnectionState updates
[POS]:    WebSocket layer - connection lifecycle state machine (single owner of socket/timers/registry)
[UPDATE]: When changing reconnect policy, keepalive, or disconnect semantics
*/

use std::sync::atomic::{AtomicUsize, Ordering};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, trace, warn};

use super::message::{TickerEvent, process_payload};
use super::registry::SubscriptionRegistry;
use crate::config::TickerConfig;
use crate::error::TickerError;
use crate::types::{ExchangeSegment, InstrumentToken, Mode, Subscription, SubscriptionRequest, login_frame};

const SUBSCRIPTION_LOG_LIMIT: usize = 10;

static SUBSCRIBE_LOG_COUNT: AtomicUsize = AtomicUsize::new(0);

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, WsMessage>;
type WsStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Connection state published by the lifecycle worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Never connected.
    Disconnected,
    Connecting,
    Open,
    /// Waiting out the reconnect delay before attempt `attempt`.
    Reconnecting { attempt: u32 },
    /// Closed by `disconnect()` or after reconnect attempts ran out.
    Closed,
}

#[derive(Debug)]
pub(crate) enum Command {
    Connect,
    Disconnect,
    SendLogin,
    Subscribe {
        segment: ExchangeSegment,
        tokens: Vec<InstrumentToken>,
        mode: Option<Mode>,
    },
    Unsubscribe {
        segment: ExchangeSegment,
        tokens: Vec<InstrumentToken>,
    },
    Resubscribe,
    Snapshot(oneshot::Sender<Vec<Subscription>>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Connecting,
    Reconnect,
    Exit,
}

#[derive(Debug)]
enum SessionExit {
    Manual,
    Shutdown,
    Remote { code: Option<u16>, reason: String },
    Transport(String),
}

#[derive(Debug)]
pub(crate) struct LifecycleWorker {
    config: TickerConfig,
    url: String,
    registry: SubscriptionRegistry,
    cmd_rx: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<TickerEvent>,
    state: watch::Sender<ConnectionState>,
    manual_close: bool,
    attempts: u32,
    sessions: u64,
}

impl LifecycleWorker {
    pub(crate) fn new(
        config: TickerConfig,
        url: String,
        cmd_rx: mpsc::UnboundedReceiver<Command>,
        events: mpsc::UnboundedSender<TickerEvent>,
        state: watch::Sender<ConnectionState>,
    ) -> Self {
        Self {
            config,
            url,
            registry: SubscriptionRegistry::new(),
            cmd_rx,
            events,
            state,
            manual_close: false,
            attempts: 0,
            sessions: 0,
        }
    }

    pub(crate) async fn run(mut self) {
        let mut phase = Phase::Idle;
        loop {
            phase = match phase {
                Phase::Idle => self.idle().await,
                Phase::Connecting => self.connect_once().await,
                Phase::Reconnect => self.schedule_reconnect().await,
                Phase::Exit => break,
            };
        }
        debug!("ticker worker stopped");
    }

    async fn idle(&mut self) -> Phase {
        loop {
            let Some(cmd) = self.cmd_rx.recv().await else {
                return Phase::Exit;
            };
            match cmd {
                Command::Connect => {
                    self.manual_close = false;
                    self.attempts = 0;
                    return Phase::Connecting;
                }
                Command::Disconnect => {
                    self.manual_close = true;
                    debug!(state = ?self.current_state(), "disconnect requested while not connected; ignoring");
                }
                other => self.handle_offline(other),
            }
        }
    }

    async fn connect_once(&mut self) -> Phase {
        self.set_state(ConnectionState::Connecting);
        info!(
            socket_url = %self.config.socket_url,
            attempt = self.attempts,
            "connecting to ticker websocket"
        );

        let connect_timeout = self.config.connect_timeout();
        let handshake = tokio::time::timeout(connect_timeout, connect_async(self.url.clone()));
        tokio::pin!(handshake);

        let result = loop {
            tokio::select! {
                result = &mut handshake => break result,
                cmd = self.cmd_rx.recv() => match cmd {
                    None => return Phase::Exit,
                    Some(Command::Disconnect) => {
                        self.close_manually();
                        return Phase::Idle;
                    }
                    Some(Command::Connect) => debug!("connect requested while connecting; ignoring"),
                    Some(other) => self.handle_offline(other),
                }
            }
        };

        let error = match result {
            Ok(Ok((ws_stream, _response))) => return self.run_session(ws_stream).await,
            Ok(Err(err)) => TickerError::from(err),
            Err(_elapsed) => TickerError::Transport(format!(
                "websocket handshake timed out after {} ms",
                connect_timeout.as_millis()
            )),
        };
        warn!(socket_url = %self.config.socket_url, error = %error, "ticker websocket connect failed");
        self.emit(TickerEvent::Error(error));
        Phase::Reconnect
    }

    async fn run_session(&mut self, ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>) -> Phase {
        let (mut sink, mut stream) = ws_stream.split();

        self.attempts = 0;
        self.sessions += 1;
        self.set_state(ConnectionState::Open);
        info!(session = self.sessions, "ticker websocket connected");

        if self.config.auto_resubscribe
            && let Err(err) = self.send_resubscribe(&mut sink).await
        {
            return self.end_session(sink, SessionExit::Transport(err.to_string())).await;
        }
        self.emit(TickerEvent::Connected);

        let exit = self.stream_loop(&mut sink, &mut stream).await;
        self.end_session(sink, exit).await
    }

    async fn stream_loop(&mut self, sink: &mut WsSink, stream: &mut WsStream) -> SessionExit {
        let ping_interval = self.config.ping_interval();
        let mut keepalive = tokio::time::interval_at(Instant::now() + ping_interval, ping_interval);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => match cmd {
                    None => return SessionExit::Shutdown,
                    Some(Command::Disconnect) => {
                        self.manual_close = true;
                        return SessionExit::Manual;
                    }
                    Some(Command::Connect) => debug!("connect requested while open; ignoring"),
                    Some(cmd) => {
                        if let Err(err) = self.handle_online(cmd, sink).await {
                            if err.is_retryable() {
                                return SessionExit::Transport(err.to_string());
                            }
                            self.emit(TickerEvent::Error(err));
                        }
                    }
                },
                incoming = stream.next() => match incoming {
                    Some(Ok(message)) => {
                        if let Some(exit) = self.handle_incoming(message) {
                            return exit;
                        }
                    }
                    Some(Err(err)) => return SessionExit::Transport(err.to_string()),
                    None => {
                        return SessionExit::Remote {
                            code: None,
                            reason: "stream ended".to_string(),
                        };
                    }
                },
                _ = keepalive.tick() => {
                    if let Err(err) = sink.send(WsMessage::Ping(Vec::new().into())).await {
                        return SessionExit::Transport(err.to_string());
                    }
                    trace!("keepalive ping sent");
                }
            }
        }
    }

    /// Runs after the keepalive interval has been dropped with `stream_loop`.
    async fn end_session(&mut self, mut sink: WsSink, exit: SessionExit) -> Phase {
        match exit {
            SessionExit::Manual => {
                send_close(&mut sink).await;
                self.close_manually();
                self.emit(TickerEvent::Closed {
                    code: Some(u16::from(CloseCode::Normal)),
                    reason: "client disconnect".to_string(),
                });
                Phase::Idle
            }
            SessionExit::Shutdown => {
                send_close(&mut sink).await;
                self.set_state(ConnectionState::Closed);
                Phase::Exit
            }
            SessionExit::Remote { code, reason } => {
                info!(?code, %reason, "ticker websocket closed by venue");
                self.emit(TickerEvent::Closed { code, reason });
                Phase::Reconnect
            }
            SessionExit::Transport(reason) => {
                warn!(error = %reason, "ticker websocket transport error");
                self.emit(TickerEvent::Error(TickerError::Transport(reason.clone())));
                let _ = sink.close().await;
                self.emit(TickerEvent::Closed { code: None, reason });
                Phase::Reconnect
            }
        }
    }

    async fn schedule_reconnect(&mut self) -> Phase {
        if self.manual_close {
            self.set_state(ConnectionState::Closed);
            return Phase::Idle;
        }
        if !self.config.auto_reconnect {
            info!("auto reconnect disabled; ticker closed");
            self.set_state(ConnectionState::Closed);
            return Phase::Idle;
        }
        if self.attempts >= self.config.max_reconnect_attempts {
            warn!(
                attempts = self.attempts,
                max_attempts = self.config.max_reconnect_attempts,
                "ticker gave up reconnecting"
            );
            self.emit(TickerEvent::Error(TickerError::ReconnectExhausted {
                attempts: self.attempts,
            }));
            self.set_state(ConnectionState::Closed);
            return Phase::Idle;
        }

        self.attempts += 1;
        let delay = self.config.reconnect_delay();
        self.set_state(ConnectionState::Reconnecting {
            attempt: self.attempts,
        });
        info!(
            attempt = self.attempts,
            max_attempts = self.config.max_reconnect_attempts,
            delay_ms = delay.as_millis() as u64,
            "scheduling ticker reconnect"
        );

        let timer = tokio::time::sleep(delay);
        tokio::pin!(timer);

        loop {
            tokio::select! {
                _ = &mut timer => return Phase::Connecting,
                cmd = self.cmd_rx.recv() => match cmd {
                    None => return Phase::Exit,
                    Some(Command::Disconnect) => {
                        self.close_manually();
                        return Phase::Idle;
                    }
                    Some(Command::Connect) => debug!("connect requested while reconnecting; ignoring"),
                    Some(other) => self.handle_offline(other),
                }
            }
        }
    }

    fn handle_incoming(&mut self, message: WsMessage) -> Option<SessionExit> {
        match message {
            WsMessage::Text(text) => self.dispatch(text.as_bytes()),
            WsMessage::Binary(bytes) => self.dispatch(bytes.as_ref()),
            WsMessage::Close(frame) => {
                let (code, reason) = match frame {
                    Some(frame) => (Some(u16::from(frame.code)), frame.reason.as_str().to_string()),
                    None => (None, "closed without frame".to_string()),
                };
                return Some(SessionExit::Remote { code, reason });
            }
            WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_) => {}
        }
        None
    }

    fn dispatch(&self, payload: &[u8]) {
        if self.config.debug {
            debug!(bytes = payload.len(), "ws frame received");
        } else {
            trace!(bytes = payload.len(), "ws frame received");
        }

        for event in process_payload(payload) {
            if let TickerEvent::Error(err) = &event {
                warn!(error = %err, bytes = payload.len(), "dropping inbound frame");
            }
            self.emit(event);
        }
    }

    async fn handle_online(&mut self, cmd: Command, sink: &mut WsSink) -> Result<(), TickerError> {
        match cmd {
            Command::SendLogin => {
                sink.send(WsMessage::Text(login_frame(&self.config.access_token).into()))
                    .await?;
                info!("ticker login frame sent");
            }
            Command::Subscribe { segment, tokens, mode } => {
                let mode = mode.unwrap_or(self.config.default_mode);
                if let Some(request) = self.registry.subscribe(segment, &tokens, mode) {
                    send_request(sink, &request).await?;
                }
            }
            Command::Unsubscribe { segment, tokens } => {
                if let Some(request) = self.registry.unsubscribe(segment, &tokens, self.config.default_mode) {
                    send_request(sink, &request).await?;
                }
            }
            Command::Resubscribe => self.send_resubscribe(sink).await?,
            Command::Snapshot(reply) => {
                let _ = reply.send(self.registry.snapshot());
            }
            // Connect and Disconnect never reach here; stream_loop handles them.
            Command::Connect | Command::Disconnect => {}
        }
        Ok(())
    }

    fn handle_offline(&mut self, cmd: Command) {
        match cmd {
            Command::Subscribe { segment, tokens, mode } => {
                let mode = mode.unwrap_or(self.config.default_mode);
                self.registry.subscribe(segment, &tokens, mode);
                debug!(%segment, %mode, count = tokens.len(), "subscription recorded while offline");
            }
            Command::Unsubscribe { segment, tokens } => {
                self.registry.unsubscribe(segment, &tokens, self.config.default_mode);
                debug!(%segment, count = tokens.len(), "unsubscription recorded while offline");
            }
            Command::SendLogin => warn!("login requested while socket not open; skipped"),
            Command::Resubscribe => debug!("resubscribe requested while offline; registry replays on next open"),
            Command::Snapshot(reply) => {
                let _ = reply.send(self.registry.snapshot());
            }
            Command::Connect | Command::Disconnect => {}
        }
    }

    async fn send_resubscribe(&self, sink: &mut WsSink) -> Result<(), TickerError> {
        let requests = self.registry.resubscribe_requests();
        if !requests.is_empty() {
            info!(
                frames = requests.len(),
                tokens = self.registry.len(),
                "replaying subscriptions"
            );
        }
        for request in &requests {
            send_request(sink, request).await?;
        }
        Ok(())
    }

    /// Manual close: flag first so nothing reschedules, then state.
    fn close_manually(&mut self) {
        self.manual_close = true;
        self.attempts = 0;
        self.set_state(ConnectionState::Closed);
    }

    fn current_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    fn set_state(&self, next: ConnectionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!(?previous, ?next, "ticker state changed");
        }
    }

    fn emit(&self, event: TickerEvent) {
        if self.events.send(event).is_err() {
            trace!("ticker event receiver dropped");
        }
    }
}

async fn send_request(sink: &mut WsSink, request: &SubscriptionRequest) -> Result<(), TickerError> {
    let payload = request.to_json()?;
    sink.send(WsMessage::Text(payload.into())).await?;
    log_subscription_sent(request);
    Ok(())
}

async fn send_close(sink: &mut WsSink) {
    let frame = CloseFrame {
        code: CloseCode::Normal,
        reason: "client disconnect".into(),
    };
    if let Err(err) = sink.send(WsMessage::Close(Some(frame))).await {
        debug!(error = %err, "close frame not delivered");
    }
}

fn log_subscription_sent(request: &SubscriptionRequest) {
    let count = SUBSCRIBE_LOG_COUNT.fetch_add(1, Ordering::Relaxed);
    if count >= SUBSCRIPTION_LOG_LIMIT {
        return;
    }

    let action = if request.is_subscribe() { "subscribe" } else { "unsubscribe" };
    info!(
        sample_index = count + 1,
        sample_limit = SUBSCRIPTION_LOG_LIMIT,
        action,
        mode = request.params.mode,
        segments = request.params.token_list.len(),
        tokens = request.token_count(),
        "ws subscription sent"
    );
}
