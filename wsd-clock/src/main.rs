//! Clock server (wsd-clock) - Main entry point
//!
//! Serves the reference clock, guest status and the guest listening page
//! on the local network.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wsd_clock::{build_router, AppState};
use wsd_common::config::TomlConfig;

/// Command-line arguments for wsd-clock
#[derive(Parser, Debug)]
#[command(name = "wsd-clock")]
#[command(about = "Reference clock and guest server for WiFi Silent Disco")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "WSD_CLOCK_PORT")]
    port: Option<u16>,

    /// Target latency announced to listeners, in seconds
    #[arg(long, env = "WSD_TARGET_LATENCY")]
    target_latency: Option<f64>,

    /// Directory containing the guest page
    #[arg(long, env = "WSD_GUEST_DIR")]
    guest_dir: Option<PathBuf>,

    /// Host of the LL-HLS origin to probe
    #[arg(long, env = "WSD_STREAM_HOST")]
    stream_host: Option<String>,

    /// Config file (overrides WSD_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = TomlConfig::resolve(args.config.as_deref())
        .context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("{},tower_http=info", config.logging.filter_directive("wsd_clock"))
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting WSD Clock Server (wsd-clock) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    // CLI overrides file values
    let server = &mut config.server;
    if let Some(port) = args.port {
        server.port = port;
    }
    if let Some(target) = args.target_latency {
        server.target_latency = target;
    }
    if args.guest_dir.is_some() {
        server.guest_dir = args.guest_dir;
    }
    if args.stream_host.is_some() {
        server.stream_host = args.stream_host;
    }
    config.validate().context("Invalid configuration")?;

    let server = config.server;
    info!("Target latency: {}s", server.target_latency);
    match &server.guest_dir {
        Some(dir) => info!("Guest page: {}", dir.display()),
        None => info!("No guest directory configured; serving API only"),
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], server.port));
    let state = AppState::new(server).context("Failed to build HTTP client")?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Reference clock: http://{}/api/time", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
