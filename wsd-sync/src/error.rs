//! Error types for wsd-sync
//!
//! Every variant is handled inside the session boundary; none of them ends a
//! listening session on its own.

use thiserror::Error;

use crate::connect::ConnectError;

/// Main error type for the sync client
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    /// Reference clock request failed (transport error or non-success status)
    #[error("Time sync unavailable: {0}")]
    Unavailable(String),

    /// Reference clock answered with a body we cannot use
    #[error("Malformed time payload: {0}")]
    Malformed(String),

    /// Target latency must be a positive, finite number of seconds
    #[error("Invalid target latency: {0}")]
    InvalidTarget(f64),

    /// Incomplete or invalid connect form
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// The media pipeline could not be opened for a source
    #[error("Pipeline error: {0}")]
    Pipeline(String),
}

/// Convenience Result type using SyncError
pub type Result<T> = std::result::Result<T, SyncError>;
