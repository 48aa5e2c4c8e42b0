/*
[INPUT]:  StreamConfig, shutdown token
[OUTPUT]: Logged ticks and control events until shutdown or fatal error
[POS]:    Runtime layer - drives one TickerClient for the binary
[UPDATE]: When changing startup order (login, subscribe) or event handling
*/

use anyhow::{Context, Result, anyhow};
use mstock_ticker::{Tick, TickerClient, TickerEvent};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::StreamConfig;

/// Counters reported when the stream stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamSummary {
    pub sessions: u64,
    pub ticks: u64,
    pub errors: u64,
}

/// Connect, log in, subscribe, and log everything until `shutdown` fires.
///
/// Subscriptions are sent after the first login. Later sessions replay the
/// client's registry: automatically when `auto_resubscribe` is on, or
/// explicitly after login otherwise. With `login` set the automatic replay is
/// turned off so the venue always sees `LOGIN` first.
pub async fn run(config: StreamConfig, shutdown: CancellationToken) -> Result<StreamSummary> {
    let mut ticker = config.ticker.clone();
    if config.login && ticker.auto_resubscribe {
        debug!("login enabled; replaying subscriptions after login instead of on connect");
        ticker.auto_resubscribe = false;
    }
    let replay_after_login = !ticker.auto_resubscribe;

    let mut client = TickerClient::new(ticker).context("create ticker client")?;
    let mut events = client
        .take_events()
        .ok_or_else(|| anyhow!("ticker events already taken"))?;
    let mut summary = StreamSummary::default();

    client.connect().context("connect ticker")?;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("shutdown requested; closing ticker");
                client.disconnect().context("disconnect ticker")?;
                break;
            }
            event = events.recv() => {
                let Some(event) = event else {
                    warn!("ticker event channel closed");
                    break;
                };
                handle_event(&client, &config, replay_after_login, event, &mut summary)?;
            }
        }
    }

    info!(
        sessions = summary.sessions,
        ticks = summary.ticks,
        errors = summary.errors,
        "ticker stream stopped"
    );
    Ok(summary)
}

fn handle_event(
    client: &TickerClient,
    config: &StreamConfig,
    replay_after_login: bool,
    event: TickerEvent,
    summary: &mut StreamSummary,
) -> Result<()> {
    match event {
        TickerEvent::Connected => {
            summary.sessions += 1;
            info!(session = summary.sessions, "ticker connected");
            if config.login {
                client.send_login()?;
            }
            if summary.sessions == 1 {
                subscribe_configured(client, config)?;
            } else if replay_after_login {
                client.resubscribe()?;
            }
        }
        TickerEvent::Ticks(ticks) => {
            summary.ticks += ticks.len() as u64;
            ticks.iter().for_each(log_tick);
        }
        TickerEvent::OrderUpdate(update) => info!(update = %update, "order update"),
        TickerEvent::TradeUpdate(update) => info!(update = %update, "trade update"),
        TickerEvent::Error(err) => {
            summary.errors += 1;
            if err.is_fatal() {
                return Err(anyhow!(err)).context("ticker stopped");
            }
            warn!(error = %err, "ticker error");
        }
        TickerEvent::Closed { code, reason } => {
            info!(?code, %reason, "ticker connection closed");
        }
    }
    Ok(())
}

fn subscribe_configured(client: &TickerClient, config: &StreamConfig) -> Result<()> {
    for subscription in &config.subscriptions {
        let tokens = subscription.instrument_tokens();
        debug!(
            segment = %subscription.segment,
            mode = ?subscription.mode,
            count = tokens.len(),
            "subscribing"
        );
        client
            .subscribe(subscription.segment, tokens, subscription.mode)
            .with_context(|| format!("subscribe {}", subscription.segment))?;
    }
    info!(
        groups = config.subscriptions.len(),
        tokens = config.token_count(),
        "subscriptions sent"
    );
    Ok(())
}

fn log_tick(tick: &Tick) {
    info!(
        segment = %tick.exchange_segment,
        token = %tick.instrument_token,
        mode = %tick.mode,
        seq = tick.sequence_number,
        last_price = %tick.last_price,
        exchange_time = ?tick.exchange_timestamp,
        "tick"
    );
}
