//! Clock offset estimation against the reference clock
//!
//! One request per attach. The offset is a single-sample estimate
//! (`server_epoch_ms - local_epoch_ms_at_receipt`) with no round-trip
//! compensation; it feeds diagnostics only, never the rate/seek path.
//!
//! Folding a fetch result into the previous snapshot is a pure function
//! ([`refresh`]), so "keep the prior values on failure" does not depend on
//! where an error was raised.

use async_trait::async_trait;
use reqwest::Url;
use std::time::Duration;
use tracing::{debug, warn};
use wsd_common::api::TimePayload;
use wsd_common::time::epoch_seconds_to_ms;

use crate::error::{Result, SyncError};

/// Source of local wall-clock time
pub trait WallClock: Send + Sync {
    /// Milliseconds since the Unix epoch
    fn now_epoch_ms(&self) -> i64;
}

/// Wall clock backed by the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now_epoch_ms(&self) -> i64 {
        wsd_common::time::now_epoch_ms()
    }
}

impl<F> WallClock for F
where
    F: Fn() -> i64 + Send + Sync,
{
    fn now_epoch_ms(&self) -> i64 {
        self()
    }
}

/// Offset and target latency as last learned from the reference clock
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncSnapshot {
    /// `server - local`, in milliseconds
    pub clock_offset_ms: i64,
    /// Always > 0
    pub target_latency_seconds: f64,
}

impl SyncSnapshot {
    /// Snapshot used before any successful fetch
    pub fn initial(target_latency_seconds: f64) -> Result<Self> {
        validate_target(target_latency_seconds)?;
        Ok(Self {
            clock_offset_ms: 0,
            target_latency_seconds,
        })
    }
}

/// Result of folding one fetch into the previous snapshot
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// At least one field was accepted
    Refreshed(SyncSnapshot),
    /// Nothing usable arrived; `retained` equals the prior snapshot
    Unavailable {
        retained: SyncSnapshot,
        reason: SyncError,
    },
}

impl SyncOutcome {
    /// Snapshot in effect after this outcome
    pub fn snapshot(&self) -> SyncSnapshot {
        match self {
            SyncOutcome::Refreshed(snapshot) => *snapshot,
            SyncOutcome::Unavailable { retained, .. } => *retained,
        }
    }

    pub fn is_refreshed(&self) -> bool {
        matches!(self, SyncOutcome::Refreshed(_))
    }
}

pub(crate) fn validate_target(target_latency_seconds: f64) -> Result<()> {
    if target_latency_seconds > 0.0 && target_latency_seconds.is_finite() {
        Ok(())
    } else {
        Err(SyncError::InvalidTarget(target_latency_seconds))
    }
}

/// Fold a reference clock result into the prior snapshot
///
/// Each payload field is accepted or rejected on its own; a rejected or
/// missing field keeps its prior value. A payload with no usable field at all
/// counts as malformed.
pub fn refresh(
    prior: SyncSnapshot,
    result: Result<TimePayload>,
    received_at_ms: i64,
) -> SyncOutcome {
    let payload = match result {
        Ok(payload) => payload,
        Err(reason) => {
            return SyncOutcome::Unavailable {
                retained: prior,
                reason,
            }
        }
    };

    let mut next = prior;
    let mut accepted = false;

    match payload.epoch {
        Some(epoch) if epoch.is_finite() => {
            next.clock_offset_ms = epoch_seconds_to_ms(epoch) - received_at_ms;
            accepted = true;
        }
        Some(epoch) => warn!("Ignoring non-finite server epoch {}", epoch),
        None => debug!("Time payload has no epoch; keeping offset {} ms", prior.clock_offset_ms),
    }

    match payload.target_latency {
        Some(target) => match validate_target(target) {
            Ok(()) => {
                next.target_latency_seconds = target;
                accepted = true;
            }
            Err(e) => warn!("Rejecting server target latency: {}", e),
        },
        None => debug!(
            "Time payload has no targetLatency; keeping {}s",
            prior.target_latency_seconds
        ),
    }

    if accepted {
        SyncOutcome::Refreshed(next)
    } else {
        SyncOutcome::Unavailable {
            retained: prior,
            reason: SyncError::Malformed("no usable epoch or targetLatency".to_string()),
        }
    }
}

/// Endpoint returning server time and the configured target latency
#[async_trait]
pub trait ReferenceClock: Send + Sync {
    async fn fetch(&self) -> Result<TimePayload>;
}

/// Reference clock reached over HTTP (`GET /api/time`)
#[derive(Debug, Clone)]
pub struct HttpReferenceClock {
    http_client: reqwest::Client,
    url: Url,
}

impl HttpReferenceClock {
    pub fn new(url: Url, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .no_proxy()
            .build()
            .map_err(|e| SyncError::Unavailable(e.to_string()))?;

        Ok(Self { http_client, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl ReferenceClock for HttpReferenceClock {
    async fn fetch(&self) -> Result<TimePayload> {
        let response = self
            .http_client
            .get(self.url.clone())
            .header("Cache-Control", "no-store")
            .send()
            .await
            .map_err(|e| SyncError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Unavailable(format!(
                "HTTP {} from {}",
                status.as_u16(),
                self.url
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| SyncError::Unavailable(e.to_string()))?;

        serde_json::from_slice::<TimePayload>(&body)
            .map_err(|e| SyncError::Malformed(e.to_string()))
    }
}

/// Combines a reference clock with the local wall clock
pub struct ClockOffsetEstimator<R, W = SystemClock> {
    reference: R,
    wall: W,
}

impl<R: ReferenceClock> ClockOffsetEstimator<R, SystemClock> {
    pub fn new(reference: R) -> Self {
        Self::with_wall_clock(reference, SystemClock)
    }
}

impl<R: ReferenceClock, W: WallClock> ClockOffsetEstimator<R, W> {
    pub fn with_wall_clock(reference: R, wall: W) -> Self {
        Self { reference, wall }
    }

    /// Perform one reference fetch and fold it into `prior`
    ///
    /// Local time is read when the response has been received.
    pub async fn fetch_sync_snapshot(&self, prior: SyncSnapshot) -> SyncOutcome {
        let result = self.reference.fetch().await;
        let received_at_ms = self.wall.now_epoch_ms();
        let outcome = refresh(prior, result, received_at_ms);

        match &outcome {
            SyncOutcome::Refreshed(snapshot) => debug!(
                "Clock offset {} ms, target latency {}s",
                snapshot.clock_offset_ms, snapshot.target_latency_seconds
            ),
            SyncOutcome::Unavailable { reason, .. } => warn!("{}", reason),
        }

        outcome
    }
}
