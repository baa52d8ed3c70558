//! Connect form validation
//!
//! The listener enters host, port, application and stream name. All four are
//! required; nothing is attached until the form validates.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use wsd_common::api::{playlist_url, TIME_ENDPOINT};

/// Validation failures for the connect form
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
    /// One or more required fields are empty
    #[error("Please fill in: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("Invalid port: {0}")]
    InvalidPort(String),

    /// A field contains a character that would change the URL's structure
    #[error("Invalid {field}: {value:?}")]
    InvalidCharacter { field: &'static str, value: String },

    #[error("Invalid stream URL: {0}")]
    InvalidUrl(String),
}

/// Characters that end or restructure a URL component
const URL_BREAKING: &[char] = &['/', '?', '#', '\\'];

fn check_component(field: &'static str, value: &str, extra: &[char]) -> Result<(), ConnectError> {
    let breaks = |c: char| c.is_whitespace() || URL_BREAKING.contains(&c) || extra.contains(&c);
    if value.chars().any(breaks) {
        return Err(ConnectError::InvalidCharacter {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Raw form input, as typed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectForm {
    pub host: String,
    pub port: String,
    pub application: String,
    pub stream: String,
}

/// A validated form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamTarget {
    pub host: String,
    pub port: u16,
    pub application: String,
    pub stream: String,
}

impl ConnectForm {
    pub fn new(
        host: impl Into<String>,
        port: impl Into<String>,
        application: impl Into<String>,
        stream: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: port.into(),
            application: application.into(),
            stream: stream.into(),
        }
    }

    /// Check every field, reporting all missing ones at once
    ///
    /// Host, application and stream must not contain path, query or fragment
    /// delimiters (the host also rejects `@`) or whitespace.
    pub fn validate(&self) -> Result<StreamTarget, ConnectError> {
        let fields = [
            ("host", self.host.trim()),
            ("port", self.port.trim()),
            ("application", self.application.trim()),
            ("stream", self.stream.trim()),
        ];

        let missing: Vec<&'static str> = fields
            .iter()
            .filter(|(_, value)| value.is_empty())
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(ConnectError::MissingFields(missing));
        }

        let port = self
            .port
            .trim()
            .parse::<u16>()
            .ok()
            .filter(|p| *p != 0)
            .ok_or_else(|| ConnectError::InvalidPort(self.port.trim().to_string()))?;

        check_component("host", self.host.trim(), &['@'])?;
        check_component("application", self.application.trim(), &[])?;
        check_component("stream", self.stream.trim(), &[])?;

        Ok(StreamTarget {
            host: self.host.trim().to_string(),
            port,
            application: self.application.trim().to_string(),
            stream: self.stream.trim().to_string(),
        })
    }

    /// Validate and build the playlist URL in one step
    pub fn playlist_url(&self) -> Result<Url, ConnectError> {
        self.validate()?.playlist_url()
    }
}

impl StreamTarget {
    /// `http://{host}:{port}/{application}/{stream}/playlist.m3u8`
    pub fn playlist_url(&self) -> Result<Url, ConnectError> {
        let url = playlist_url(&self.host, self.port, &self.application, &self.stream);
        Url::parse(&url).map_err(|e| ConnectError::InvalidUrl(format!("{}: {}", url, e)))
    }

    /// Reference clock served by the guest HTTP server on the same host
    pub fn clock_url(&self, guest_port: u16) -> Result<Url, ConnectError> {
        let url = format!("http://{}:{}{}", self.host, guest_port, TIME_ENDPOINT);
        Url::parse(&url).map_err(|e| ConnectError::InvalidUrl(format!("{}: {}", url, e)))
    }
}
