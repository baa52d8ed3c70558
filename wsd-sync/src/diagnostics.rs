//! Read-only diagnostics shown to the listener

use serde::Serialize;
use std::fmt;

/// Connection status line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionStatus {
    NotConnected,
    Connecting,
    Playing,
    /// Autoplay was refused; playback waits for a user gesture
    TapToPlay,
    /// A fatal pipeline error triggered re-attachment
    Reconnecting,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::NotConnected => "Not connected",
            ConnectionStatus::Connecting => "Connecting",
            ConnectionStatus::Playing => "Playing",
            ConnectionStatus::TapToPlay => "Tap to play",
            ConnectionStatus::Reconnecting => "Reconnecting",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status text shown when the last reference clock fetch failed
pub const SYNC_UNAVAILABLE: &str = "Time sync unavailable";

/// Everything the listener sees about their session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostics {
    pub status: ConnectionStatus,
    /// `Some(SYNC_UNAVAILABLE)` after a failed fetch, cleared on success
    pub sync_status: Option<&'static str>,
    /// `None` renders as "unknown"
    pub measured_latency_seconds: Option<f64>,
    pub target_latency_seconds: f64,
    pub rate_multiplier: f64,
    /// `None` until the first successful fetch
    pub clock_offset_ms: Option<i64>,
    pub fatal_reattaches: u64,
}

impl Diagnostics {
    pub fn new(target_latency_seconds: f64) -> Self {
        Self {
            status: ConnectionStatus::NotConnected,
            sync_status: None,
            measured_latency_seconds: None,
            target_latency_seconds,
            rate_multiplier: 1.0,
            clock_offset_ms: None,
            fatal_reattaches: 0,
        }
    }

    /// Back to "not connected"; sync values and counters survive
    pub fn reset(&mut self) {
        self.status = ConnectionStatus::NotConnected;
        self.measured_latency_seconds = None;
        self.rate_multiplier = 1.0;
    }

    pub fn latency_text(&self) -> String {
        match self.measured_latency_seconds {
            Some(latency) => format!("{:.2}s", latency),
            None => "unknown".to_string(),
        }
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sync_status {
            Some(sync) => writeln!(f, "Status:         {} ({})", self.status, sync)?,
            None => writeln!(f, "Status:         {}", self.status)?,
        }
        writeln!(f, "Latency:        {}", self.latency_text())?;
        writeln!(f, "Target latency: {:.2}s", self.target_latency_seconds)?;
        writeln!(f, "Rate:           {:.3}x", self.rate_multiplier)?;
        match self.clock_offset_ms {
            Some(offset) => write!(f, "Clock offset:   {} ms", offset)?,
            None => write!(f, "Clock offset:   unknown")?,
        }
        if self.fatal_reattaches > 0 {
            write!(f, "\nReconnects:     {}", self.fatal_reattaches)?;
        }
        Ok(())
    }
}
