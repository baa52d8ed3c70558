//! LL-HLS playlist probe
//!
//! Tells the operator whether the encoder is publishing yet.

use reqwest::{StatusCode, Url};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Probe timeout
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Result of one playlist probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamStatus {
    Live,
    WaitingForPublisher,
    HttpError(u16),
    Unreachable,
    ProbeFailed,
}

impl StreamStatus {
    /// Classify a response status
    pub fn from_status(status: StatusCode) -> Self {
        match status.as_u16() {
            code if code < 400 => StreamStatus::Live,
            404 => StreamStatus::WaitingForPublisher,
            code => StreamStatus::HttpError(code),
        }
    }

    /// Classify a transport failure
    pub fn from_error(err: &reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            StreamStatus::Unreachable
        } else {
            StreamStatus::ProbeFailed
        }
    }

    pub fn message(&self) -> String {
        match self {
            StreamStatus::Live => "Live stream detected".to_string(),
            StreamStatus::WaitingForPublisher => "Waiting for OBS to publish".to_string(),
            StreamStatus::HttpError(code) => format!("HTTP {} from LL-HLS", code),
            StreamStatus::Unreachable => "Stream endpoint unreachable".to_string(),
            StreamStatus::ProbeFailed => "Stream probe failed".to_string(),
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, StreamStatus::Live)
    }
}

/// Response body of `GET /api/stream`
#[derive(Debug, Clone, Serialize)]
pub struct StreamReport {
    pub url: String,
    pub live: bool,
    pub status: String,
}

impl StreamReport {
    pub fn new(url: &Url, status: &StreamStatus) -> Self {
        Self {
            url: url.to_string(),
            live: status.is_live(),
            status: status.message(),
        }
    }
}

/// GET the playlist once and classify the outcome
pub async fn probe(client: &reqwest::Client, url: &Url) -> StreamStatus {
    let status = match client.get(url.clone()).send().await {
        Ok(response) => StreamStatus::from_status(response.status()),
        Err(e) => StreamStatus::from_error(&e),
    };
    debug!("Probe {} -> {:?}", url, status);
    status
}
