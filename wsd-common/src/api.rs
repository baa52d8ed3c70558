//! Wire types shared by the clock server and the sync client

use serde::{Deserialize, Deserializer, Serialize};

/// Path of the reference clock endpoint on the guest HTTP server
pub const TIME_ENDPOINT: &str = "/api/time";

/// Body of `GET /api/time`
///
/// Both fields are optional on the receiving side: a server that omits one,
/// or sends it with the wrong type, leaves the client's prior value in effect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct TimePayload {
    /// Server time in seconds since the Unix epoch (sub-second precision)
    #[serde(
        default,
        deserialize_with = "lenient_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub epoch: Option<f64>,

    /// Latency every client should converge to, in seconds
    #[serde(
        rename = "targetLatency",
        default,
        deserialize_with = "lenient_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub target_latency: Option<f64>,
}

impl TimePayload {
    pub fn new(epoch: f64, target_latency: f64) -> Self {
        Self {
            epoch: Some(epoch),
            target_latency: Some(target_latency),
        }
    }
}

/// A number, or `None` for anything else (string, null, object)
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Field {
        Number(f64),
        Other(serde::de::IgnoredAny),
    }

    Ok(match Field::deserialize(deserializer)? {
        Field::Number(value) => Some(value),
        Field::Other(_) => None,
    })
}

/// Build the LL-HLS playlist URL for a stream
///
/// `http://{host}:{port}/{application}/{stream}/playlist.m3u8`
pub fn playlist_url(host: &str, port: u16, application: &str, stream: &str) -> String {
    format!(
        "http://{}:{}/{}/{}/playlist.m3u8",
        host, port, application, stream
    )
}
