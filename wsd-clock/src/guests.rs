//! Guest tracking
//!
//! Every `/api/time` request registers the caller's IP. Guests are never
//! forgotten while the server runs; the summary reports them idle once the
//! most recent ping is older than the idle threshold.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::net::IpAddr;
use std::time::Duration;
use tokio::sync::RwLock;

/// Overall guest activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GuestState {
    None,
    Active,
    Idle,
}

/// Response body of `GET /api/guests`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuestSummary {
    pub count: usize,
    pub state: GuestState,
    /// `None` until the first ping
    pub last_ping_seconds_ago: Option<f64>,
}

#[derive(Debug, Default)]
struct Inner {
    clients: HashSet<IpAddr>,
    last_ping: Option<DateTime<Utc>>,
}

/// Set of distinct guest IPs plus the time of the latest ping
#[derive(Debug)]
pub struct GuestTracker {
    inner: RwLock<Inner>,
    idle_after: Duration,
}

impl GuestTracker {
    pub fn new(idle_after: Duration) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            idle_after,
        }
    }

    /// Record a ping from `ip` at `at`
    ///
    /// Returns true the first time `ip` is seen.
    pub async fn register(&self, ip: IpAddr, at: DateTime<Utc>) -> bool {
        let mut inner = self.inner.write().await;
        inner.last_ping = Some(at);
        inner.clients.insert(ip)
    }

    pub async fn summary(&self, now: DateTime<Utc>) -> GuestSummary {
        let inner = self.inner.read().await;
        let count = inner.clients.len();

        let elapsed = inner
            .last_ping
            .map(|last| (now - last).to_std().unwrap_or(Duration::ZERO));

        let state = match elapsed {
            _ if count == 0 => GuestState::None,
            Some(elapsed) if elapsed < self.idle_after => GuestState::Active,
            _ => GuestState::Idle,
        };

        GuestSummary {
            count,
            state,
            last_ping_seconds_ago: elapsed.map(|e| e.as_secs_f64()),
        }
    }
}
