//! Event types for the WSD event bus

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Events published by a listening session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SyncEvent {
    /// A stream was attached and its controller started
    Attached {
        session_id: Uuid,
        source: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The controller was stopped and the pipeline released
    Detached {
        session_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A reference clock fetch produced new offset/target values
    SnapshotRefreshed {
        session_id: Uuid,
        clock_offset_ms: i64,
        target_latency_seconds: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A reference clock fetch failed; prior values stay in effect
    SyncUnavailable {
        session_id: Uuid,
        reason: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// One controller tick completed
    ///
    /// `measured_latency_seconds` is `None` when the pipeline cannot report latency.
    Tick {
        session_id: Uuid,
        measured_latency_seconds: Option<f64>,
        rate_multiplier: f64,
        seek_adjustment_seconds: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The pipeline reported a fatal error and the source is being re-attached
    FatalErrorReattach {
        session_id: Uuid,
        source: String,
        details: String,
        attempt: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Programmatic playback was refused by the host; waiting for a user gesture
    AutoplayBlocked {
        session_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl SyncEvent {
    /// Event name as used in the serialized `type` tag
    pub fn event_type(&self) -> &'static str {
        match self {
            SyncEvent::Attached { .. } => "Attached",
            SyncEvent::Detached { .. } => "Detached",
            SyncEvent::SnapshotRefreshed { .. } => "SnapshotRefreshed",
            SyncEvent::SyncUnavailable { .. } => "SyncUnavailable",
            SyncEvent::Tick { .. } => "Tick",
            SyncEvent::FatalErrorReattach { .. } => "FatalErrorReattach",
            SyncEvent::AutoplayBlocked { .. } => "AutoplayBlocked",
        }
    }
}
