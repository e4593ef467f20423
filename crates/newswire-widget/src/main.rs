//! Newswire widget - headless entry point.
//!
//! Connects to the news feed, logs incoming items and runs until Ctrl-C.

use anyhow::Result;
use clap::Parser;
use newswire_widget::{AppConfig, InitOptions, Widget};
use newswire_ws::FeedEvent;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

/// Newswire financial news widget
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via NEWSWIRE_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// Widget API key
    #[arg(long, env = "NEWSWIRE_API_KEY")]
    api_key: String,

    /// Exchange user the widget trades for
    #[arg(long)]
    exchange_user_id: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Must run before any wss:// connection
    newswire_ws::init_crypto();

    let args = Args::parse();

    // CLI arg > NEWSWIRE_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("NEWSWIRE_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    let config = AppConfig::load_or_default(&config_path)?;
    newswire_telemetry::init_logging(config.telemetry.log_level.as_deref())?;

    info!("Starting newswire widget v{}", env!("CARGO_PKG_VERSION"));
    info!(config_path = %config_path, feed_url = %config.websocket.url, "Configuration loaded");

    let widget = Widget::new(config);
    let mut feed = widget.subscribe_feed();

    widget
        .initialize(InitOptions {
            api_key: args.api_key,
            exchange_user_id: args.exchange_user_id,
        })
        .await?;

    loop {
        tokio::select! {
            event = feed.recv() => match event {
                Ok(FeedEvent::News(item)) => {
                    info!(id = %item.id, source = ?item.source, "{}", item.title);
                }
                Ok(FeedEvent::VolumeAlert(alert)) => {
                    info!(coin = %alert.coin, "Volume alert: {}", alert.title);
                }
                Ok(FeedEvent::Error(message)) => warn!(%message, "Feed error"),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Feed log lagging"),
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    widget.destroy().await;
    Ok(())
}
