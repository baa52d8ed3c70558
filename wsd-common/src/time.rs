//! Timestamp utilities

use chrono::{DateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current wall-clock time in milliseconds since the Unix epoch
pub fn now_epoch_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Current wall-clock time in (fractional) seconds since the Unix epoch
///
/// Matches the `epoch` field served by the reference clock.
pub fn now_epoch_seconds() -> f64 {
    let now = Utc::now();
    now.timestamp() as f64 + f64::from(now.timestamp_subsec_micros()) / 1_000_000.0
}

/// Convert fractional epoch seconds to whole milliseconds (rounded)
pub fn epoch_seconds_to_ms(seconds: f64) -> i64 {
    (seconds * 1000.0).round() as i64
}

/// Convert milliseconds to duration
pub fn millis_to_duration(millis: u64) -> std::time::Duration {
    std::time::Duration::from_millis(millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        // After 2000-01-01 and before 2100-01-01
        assert!(timestamp.timestamp() > 946_684_800);
        assert!(timestamp.timestamp() < 4_102_444_800);
    }

    #[test]
    fn test_epoch_ms_and_seconds_agree() {
        let ms = now_epoch_ms();
        let secs = now_epoch_seconds();
        // Taken a few microseconds apart; allow one second of slack
        assert!((epoch_seconds_to_ms(secs) - ms).abs() < 1000);
    }

    #[test]
    fn test_epoch_seconds_to_ms_keeps_subsecond_precision() {
        assert_eq!(epoch_seconds_to_ms(1_700_000_000.0), 1_700_000_000_000);
        assert_eq!(epoch_seconds_to_ms(1_700_000_000.25), 1_700_000_000_250);
        assert_eq!(epoch_seconds_to_ms(1_700_000_000.0004), 1_700_000_000_000);
    }

    #[tokio::test]
    async fn test_now_successive_calls_advance() {
        let time1 = now();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let time2 = now();
        assert!(time2 > time1);
    }

    #[test]
    fn test_millis_to_duration() {
        assert_eq!(millis_to_duration(0), Duration::ZERO);
        assert_eq!(millis_to_duration(1200), Duration::from_millis(1200));
        assert_eq!(millis_to_duration(3_600_000), Duration::from_secs(3600));
    }
}
