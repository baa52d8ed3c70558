//! # WSD Clock Server (wsd-clock)
//!
//! Runs next to the media server and serves guests on the local network:
//! - `GET /api/time`: reference clock and target latency for every listener
//! - `GET /api/guests`: how many distinct devices have synced, and whether
//!   they are still active
//! - `GET /api/stream`: whether the encoder is publishing to the LL-HLS origin
//! - everything else: the static guest page from `guest_dir`

use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use wsd_common::config::ServerConfig;

pub mod api;
pub mod error;
pub mod guests;
pub mod stream;

use guests::GuestTracker;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub guests: Arc<GuestTracker>,
    /// Client used for stream probes
    pub http_client: reqwest::Client,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .timeout(stream::PROBE_TIMEOUT)
            .no_proxy()
            .build()?;
        let guests = GuestTracker::new(Duration::from_secs(config.guest_idle_seconds));

        Ok(Self {
            config: Arc::new(config),
            guests: Arc::new(guests),
            http_client,
        })
    }
}

/// Build application router
///
/// The caller must serve it with connect info (`into_make_service_with_connect_info`)
/// so `/api/time` can see guest addresses.
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    let guest_dir = state.config.guest_dir.clone();

    let router = Router::new()
        .route(wsd_common::api::TIME_ENDPOINT, get(api::get_time))
        .route("/api/guests", get(api::get_guests))
        .route("/api/stream", get(api::get_stream))
        .merge(api::health_routes())
        .with_state(state);

    let router = match guest_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    };

    router
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
