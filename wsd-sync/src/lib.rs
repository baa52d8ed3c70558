//! # WSD Sync Client Library (wsd-sync)
//!
//! Keeps a listener's live playback converged on the server-asserted target
//! latency so everyone on the network hears the stream in near lock-step.
//!
//! **Components:**
//! - [`clock`]: one-shot clock offset estimate against the reference clock
//! - [`controller`]: proportional rate/seek latency controller
//! - [`session`]: attach/detach lifecycle and fatal-error re-attachment
//! - [`scheduler`]: injectable periodic tick source
//! - [`runner`]: single-task async host loop
//!
//! The media engine itself is external and reached through [`pipeline::MediaPipeline`].

pub mod clock;
pub mod connect;
pub mod controller;
pub mod diagnostics;
pub mod error;
pub mod pipeline;
pub mod runner;
pub mod scheduler;
pub mod session;

pub use error::{Result, SyncError};
pub use session::Session;
