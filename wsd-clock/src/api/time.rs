//! Reference clock endpoint

use axum::{
    extract::{ConnectInfo, State},
    http::header,
    response::IntoResponse,
    Json,
};
use std::net::SocketAddr;
use tracing::info;
use wsd_common::api::TimePayload;
use wsd_common::time;

use crate::AppState;

/// GET /api/time
///
/// Returns server epoch seconds and the target latency, and records the
/// caller as a guest. Sent with `Cache-Control: no-store`.
pub async fn get_time(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> impl IntoResponse {
    let now = time::now();
    if state.guests.register(addr.ip(), now).await {
        info!("New guest {}", addr.ip());
    }

    let payload = TimePayload::new(time::now_epoch_seconds(), state.config.target_latency);

    ([(header::CACHE_CONTROL, "no-store")], Json(payload))
}
