/*
[INPUT]:  CLI arguments, YAML configuration file, OS shutdown signals
[OUTPUT]: Logged ticks from the mStock feed with graceful shutdown
[POS]:    Binary entry point
[UPDATE]: When changing CLI flags, startup flow, or shutdown handling
*/

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use mstock_ticker_stream::StreamConfig;

#[derive(Parser, Debug)]
#[command(name = "mstock-ticker-stream", version, about = "mStock real-time tick streamer")]
struct Cli {
    #[arg(long = "config", value_name = "PATH")]
    config_path: PathBuf,
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    log_level: String,
    #[arg(long = "dry-run")]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(&args.log_level)?;

    info!(
        config_path = %args.config_path.display(),
        dry_run = args.dry_run,
        "starting mstock-ticker-stream"
    );

    let config = load_config(&args.config_path)?;
    info!(
        socket_url = %config.ticker.socket_url,
        groups = config.subscriptions.len(),
        tokens = config.token_count(),
        "configuration loaded"
    );

    if args.dry_run {
        info!("dry-run requested; configuration validated");
        return Ok(());
    }

    let shutdown = CancellationToken::new();
    spawn_shutdown_listener(shutdown.clone());

    let summary = mstock_ticker_stream::run(config, shutdown)
        .await
        .context("run ticker stream")?;
    info!(
        sessions = summary.sessions,
        ticks = summary.ticks,
        "shutdown complete"
    );

    Ok(())
}

/// `RUST_LOG` wins over `--log-level` when set.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level {log_level:?}"))?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|err| anyhow!(err))
        .context("initialize tracing subscriber")?;
    Ok(())
}

fn load_config(path: &Path) -> Result<StreamConfig> {
    StreamConfig::from_file(path).context("load config")
}

/// Cancel `shutdown` on the first of SIGINT or SIGTERM.
fn spawn_shutdown_listener(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let signal = wait_for_signal().await;
        info!(signal, "shutdown signal received");
        shutdown.cancel();
    });
}

#[cfg(unix)]
async fn wait_for_signal() -> &'static str {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => Some(stream),
        Err(err) => {
            warn!(error = %err, "SIGTERM handler unavailable; listening for SIGINT only");
            None
        }
    };
    let sigterm = async {
        match terminate.as_mut() {
            Some(stream) => {
                stream.recv().await;
            }
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        _ = interrupt() => "SIGINT",
        _ = sigterm => "SIGTERM",
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> &'static str {
    interrupt().await;
    "SIGINT"
}

/// Resolves on Ctrl-C. Never resolves when the handler cannot be installed.
async fn interrupt() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "SIGINT handler unavailable");
        std::future::pending::<()>().await;
    }
}
