//! Operator status endpoints: guest activity and stream availability

use axum::{extract::State, Json};
use reqwest::Url;
use wsd_common::api::playlist_url;

use crate::error::{ApiError, ApiResult};
use crate::guests::GuestSummary;
use crate::stream::{self, StreamReport};
use crate::AppState;

/// GET /api/guests
pub async fn get_guests(State(state): State<AppState>) -> Json<GuestSummary> {
    Json(state.guests.summary(wsd_common::time::now()).await)
}

/// GET /api/stream
///
/// Probes the configured LL-HLS playlist on every call.
pub async fn get_stream(State(state): State<AppState>) -> ApiResult<Json<StreamReport>> {
    let config = &state.config;
    let host = config.stream_host.as_deref().unwrap_or("127.0.0.1");
    let raw = playlist_url(host, config.stream_port, &config.stream_app, &config.stream_name);
    let url = Url::parse(&raw).map_err(|e| ApiError::InvalidStreamUrl(format!("{}: {}", raw, e)))?;

    let status = stream::probe(&state.http_client, &url).await;
    Ok(Json(StreamReport::new(&url, &status)))
}
