//! `tagbridge`: publish contactless card presentations as JSON lines.
//!
//! ```text
//! tagbridge [settings.json]
//! ```
//!
//! Events go to standard output, one JSON object per line, after a first
//! line advertising the configuration schema. Each line read from standard
//! input is applied as a configuration push, e.g.
//! `{"tagReadIntervalMs": 500}`. Logs go to standard error and are filtered
//! with `RUST_LOG` (default `info`).

mod transport;

use anyhow::Context;
use tagbridge_core::{FIRMWARE_NAME, VERSION};
use tagbridge_hardware::AnyTagReader;
use tagbridge_scanner::{BridgeContext, BridgeSettings};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::transport::StdoutTransport;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!(firmware = FIRMWARE_NAME, version = VERSION, "starting");

    let settings = match std::env::args().nth(1) {
        Some(path) => BridgeSettings::load(&path)
            .with_context(|| format!("loading settings from {path}"))?,
        None => {
            warn!("no settings file given, using a mock reader");
            BridgeSettings::default()
        }
    };

    let reader = AnyTagReader::open(&settings.reader)
        .await
        .context("opening reader")?;

    let bridge = BridgeContext::builder(reader, StdoutTransport::stdout())
        .with_config(settings.poll_config()?)
        .with_poll_timeout(settings.poll_timeout())
        .with_sector_range(settings.sector_range)
        .build();

    let (config_tx, config_rx) = mpsc::channel(8);
    tokio::spawn(forward_config_pushes(config_tx));

    let bridge = bridge.run(config_rx, shutdown_signal()).await;

    let stats = bridge.stats();
    info!(
        ticks = stats.ticks,
        published = stats.published,
        poll_failures = stats.poll_failures,
        read_failures = stats.read_failures,
        "stopped"
    );
    Ok(())
}

/// Forward each non-empty stdin line to the run loop.
async fn forward_config_pushes(tx: mpsc::Sender<String>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => {}
            Ok(Some(line)) => {
                if tx.send(line).await.is_err() {
                    break;
                }
            }
            Ok(None) => {
                debug!("stdin closed, no further config pushes");
                break;
            }
            Err(e) => {
                error!(error = %e, "reading stdin failed");
                break;
            }
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "cannot listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
