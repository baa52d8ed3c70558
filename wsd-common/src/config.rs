//! Configuration loading and config file resolution
//!
//! Bootstrap configuration lives in a single TOML file shared by both binaries.
//! Config file resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. `WSD_CONFIG` environment variable
//! 3. `<config dir>/wsd/config.toml` if it exists
//! 4. Compiled defaults (fallback)
//!
//! A missing file is never fatal: a warning is logged and defaults are used.
//! A file that exists but does not parse or validate is an error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "WSD_CONFIG";

/// Target latency asserted when nothing better is known (seconds)
pub const DEFAULT_TARGET_LATENCY: f64 = 2.0;

/// Complete bootstrap configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub controller: ControllerConfig,
    pub client: ClientConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

/// Latency controller tuning
///
/// Defaults reproduce the reference behavior: 1.2 s tick, 0.35 s seek
/// dead-band, seek gain 0.5 clamped to ±0.6 s, rate gain 0.08 clamped to ±6%.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub tick_period_ms: u64,
    pub dead_band_seconds: f64,
    pub seek_gain: f64,
    pub max_seek_seconds: f64,
    pub rate_gain: f64,
    pub min_rate: f64,
    pub max_rate: f64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            tick_period_ms: 1200,
            dead_band_seconds: 0.35,
            seek_gain: 0.5,
            max_seek_seconds: 0.6,
            rate_gain: 0.08,
            min_rate: 0.94,
            max_rate: 1.06,
        }
    }
}

impl ControllerConfig {
    pub fn tick_period(&self) -> Duration {
        crate::time::millis_to_duration(self.tick_period_ms)
    }

    /// Reject tunings the controller cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.tick_period_ms == 0 {
            return Err(Error::Config("controller.tick_period_ms must be > 0".to_string()));
        }
        if !(self.dead_band_seconds >= 0.0 && self.dead_band_seconds.is_finite()) {
            return Err(Error::Config(format!(
                "controller.dead_band_seconds must be >= 0 (got {})",
                self.dead_band_seconds
            )));
        }
        for (name, value) in [
            ("seek_gain", self.seek_gain),
            ("max_seek_seconds", self.max_seek_seconds),
            ("rate_gain", self.rate_gain),
        ] {
            if !(value > 0.0 && value.is_finite()) {
                return Err(Error::Config(format!(
                    "controller.{} must be > 0 (got {})",
                    name, value
                )));
            }
        }
        if !(self.min_rate > 0.0 && self.min_rate <= 1.0 && self.max_rate >= 1.0)
            || !self.max_rate.is_finite()
        {
            return Err(Error::Config(format!(
                "controller rate bounds must satisfy 0 < min_rate <= 1 <= max_rate (got {}..{})",
                self.min_rate, self.max_rate
            )));
        }
        Ok(())
    }
}

/// Listener-side settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Reference clock URL; derived from the stream host when absent
    pub clock_url: Option<String>,
    /// Target latency used until the first successful clock fetch
    pub default_target_latency: f64,
    pub request_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            clock_url: None,
            default_target_latency: DEFAULT_TARGET_LATENCY,
            request_timeout_ms: 2000,
        }
    }
}

/// Clock server settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub target_latency: f64,
    /// Directory served to guests as the listening page
    pub guest_dir: Option<PathBuf>,
    /// Host of the LL-HLS origin; defaults to localhost
    pub stream_host: Option<String>,
    pub stream_port: u16,
    pub stream_app: String,
    pub stream_name: String,
    /// Guests that have not pinged for this long are reported idle
    pub guest_idle_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8088,
            target_latency: DEFAULT_TARGET_LATENCY,
            guest_dir: None,
            stream_host: None,
            stream_port: 3333,
            stream_app: "app".to_string(),
            stream_name: "stream".to_string(),
            guest_idle_seconds: 60,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Default `EnvFilter` directive for `target`, used when `RUST_LOG` is unset
    pub fn filter_directive(&self, target: &str) -> String {
        format!("{}={}", target, self.level)
    }
}

impl TomlConfig {
    /// Resolve and load configuration, falling back to defaults when no file exists
    pub fn resolve(cli_arg: Option<&Path>) -> Result<Self> {
        match resolve_config_path(cli_arg) {
            Some(path) if path.exists() => Self::load(&path),
            Some(path) => {
                warn!(
                    "Config file {} not found, using built-in defaults",
                    path.display()
                );
                Ok(Self::default())
            }
            None => {
                info!("No config file found, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::parse(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse and validate TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let config: TomlConfig =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.controller.validate()?;
        validate_target_latency("client.default_target_latency", self.client.default_target_latency)?;
        validate_target_latency("server.target_latency", self.server.target_latency)?;
        Ok(())
    }
}

fn validate_target_latency(name: &str, value: f64) -> Result<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(Error::Config(format!("{} must be > 0 (got {})", name, value)))
    }
}

/// Pick the config file to read
///
/// Returns `None` only when neither an explicit path nor a default file exists.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Per-user config file
    default_config_path().filter(|p| p.exists())
}

/// `<config dir>/wsd/config.toml` for the current platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("wsd").join("config.toml"))
}
