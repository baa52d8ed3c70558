//! Sync probe (wsd-sync) - Main entry point
//!
//! Validates the connect settings a listener would enter, performs one
//! reference clock fetch and prints the diagnostics block the player shows.
//! A failed clock fetch is reported, not treated as an error.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use reqwest::Url;
use serde_json::json;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wsd_common::config::TomlConfig;
use wsd_common::time::millis_to_duration;
use wsd_sync::clock::{ClockOffsetEstimator, HttpReferenceClock, SyncOutcome, SyncSnapshot};
use wsd_sync::connect::ConnectForm;
use wsd_sync::diagnostics::{Diagnostics, SYNC_UNAVAILABLE};

/// Command-line arguments for wsd-sync
#[derive(Parser, Debug)]
#[command(name = "wsd-sync")]
#[command(about = "Check clock sync and stream settings for a WiFi Silent Disco listener")]
#[command(version)]
struct Args {
    /// Media server host
    #[arg(long, env = "WSD_HOST")]
    host: Option<String>,

    /// LL-HLS port on the media server
    #[arg(long, env = "WSD_PORT")]
    port: Option<String>,

    /// Application name
    #[arg(long = "app", env = "WSD_APP")]
    application: Option<String>,

    /// Stream name
    #[arg(long, env = "WSD_STREAM")]
    stream: Option<String>,

    /// Reference clock URL (defaults to http://{host}:{clock-port}/api/time)
    #[arg(long, env = "WSD_CLOCK_URL")]
    clock_url: Option<String>,

    /// Port of the guest HTTP server serving the reference clock
    #[arg(long, default_value = "8088")]
    clock_port: u16,

    /// Config file (overrides WSD_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = TomlConfig::resolve(args.config.as_deref())
        .context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.filter_directive("wsd_sync").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let form = ConnectForm::new(
        args.host.unwrap_or_default(),
        args.port.unwrap_or_default(),
        args.application.unwrap_or_default(),
        args.stream.unwrap_or_default(),
    );
    let target = form.validate().context("Cannot connect")?;
    let playlist = target.playlist_url().context("Cannot connect")?;

    let clock_url = match args.clock_url.or(config.client.clock_url.clone()) {
        Some(url) => Url::parse(&url).with_context(|| format!("Invalid clock URL {}", url))?,
        None => target
            .clock_url(args.clock_port)
            .context("Cannot derive clock URL")?,
    };

    info!("Stream: {}", playlist);
    info!("Reference clock: {}", clock_url);

    let initial = SyncSnapshot::initial(config.client.default_target_latency)
        .context("Invalid default target latency")?;
    let reference = HttpReferenceClock::new(
        clock_url.clone(),
        millis_to_duration(config.client.request_timeout_ms),
    )
    .context("Failed to build HTTP client")?;
    let estimator = ClockOffsetEstimator::new(reference);

    let outcome = estimator.fetch_sync_snapshot(initial).await;

    let mut diagnostics = Diagnostics::new(initial.target_latency_seconds);
    let failure = match &outcome {
        SyncOutcome::Refreshed(snapshot) => {
            diagnostics.clock_offset_ms = Some(snapshot.clock_offset_ms);
            diagnostics.target_latency_seconds = snapshot.target_latency_seconds;
            None
        }
        SyncOutcome::Unavailable { reason, .. } => {
            diagnostics.sync_status = Some(SYNC_UNAVAILABLE);
            Some(reason.to_string())
        }
    };

    if args.json {
        let report = json!({
            "stream": playlist.as_str(),
            "clock": clock_url.as_str(),
            "diagnostics": diagnostics,
            "sync_error": failure,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Stream:         {}", playlist);
        println!("{}", diagnostics);
        if let Some(reason) = failure {
            println!("Sync error:     {}", reason);
        }
    }

    Ok(())
}
