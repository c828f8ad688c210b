//! Epoch-seconds clock helpers.
//!
//! Storage uses Unix epoch seconds throughout; RFC 3339 strings are
//! produced only for the external interface.

use chrono::{DateTime, TimeZone, Utc};

use crate::SECONDS_PER_DAY;

/// Current Unix time in seconds.
pub fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Expiry timestamp for a grant of `days` starting at `from`.
pub fn expiry_after_days(from: u64, days: u32) -> u64 {
    from + u64::from(days) * SECONDS_PER_DAY
}

/// Format an epoch-seconds timestamp as RFC 3339 (UTC).
///
/// Out-of-range values clamp to the epoch rather than failing; they can
/// only arise from a corrupted store.
pub fn to_rfc3339(secs: u64) -> String {
    let ts = i64::try_from(secs).unwrap_or(0);
    Utc.timestamp_opt(ts, 0)
        .single()
        .map(|dt: DateTime<Utc>| dt.to_rfc3339())
        .unwrap_or_else(|| "1970-01-01T00:00:00+00:00".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_after_days() {
        assert_eq!(expiry_after_days(1_000, 30), 1_000 + 30 * 86_400);
        assert_eq!(expiry_after_days(0, 0), 0);
    }

    #[test]
    fn test_rfc3339_known_value() {
        assert_eq!(to_rfc3339(0), "1970-01-01T00:00:00+00:00");
        assert_eq!(to_rfc3339(1_700_000_000), "2023-11-14T22:13:20+00:00");
    }

    #[test]
    fn test_now_is_recent() {
        // Sometime after 2023.
        assert!(now_secs() > 1_700_000_000);
    }
}
