//! # WSD Common Library
//!
//! Shared code for the WiFi Silent Disco sync client and clock server:
//! - Configuration loading (TOML bootstrap, env, compiled defaults)
//! - Reference clock wire types
//! - Event types (SyncEvent enum)
//! - Time helpers

pub mod api;
pub mod config;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, Result};
