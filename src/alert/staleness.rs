//! Cached-feed staleness detection.
//!
//! When the live feed is down the dashboard keeps working from the local
//! copy, but a copy from last week would show due dates that are long out of
//! date without anything on screen saying so. These helpers decide when the
//! cache notice should also carry a staleness warning.
//!
//! # Clock injection
//! All functions accept a `now: DateTime<Utc>` parameter rather than calling
//! `Utc::now()` internally, so staleness is deterministic in tests.

use chrono::{DateTime, Utc};

use crate::model::DataOrigin;

// ---------------------------------------------------------------------------
// Staleness check
// ---------------------------------------------------------------------------

/// Returns `true` if `saved_at` is older than `max_age_minutes` relative to
/// `now`.
///
/// Staleness is strictly greater than the threshold:
///   age > max_age_minutes  ->  stale
///   age == max_age_minutes ->  not stale
///
/// A timestamp in the future (clock skew between hosts) is never stale.
pub fn is_stale_at(saved_at: DateTime<Utc>, max_age_minutes: u64, now: DateTime<Utc>) -> bool {
    let age_minutes = (now - saved_at).num_minutes();
    age_minutes > 0 && age_minutes as u64 > max_age_minutes
}

/// Staleness of a whole snapshot origin. Live and static data are never
/// stale; a cached copy with no recorded save time is.
pub fn origin_is_stale(origin: &DataOrigin, max_age_minutes: u64, now: DateTime<Utc>) -> bool {
    match origin {
        DataOrigin::Live | DataOrigin::Static => false,
        DataOrigin::Cache { saved_at: Some(saved_at) } => {
            is_stale_at(*saved_at, max_age_minutes, now)
        }
        DataOrigin::Cache { saved_at: None } => true,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    /// A fixed "now" used across all tests: 2024-05-01 13:00:00 UTC.
    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 13, 0, 0).unwrap()
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, h, m, 0).unwrap()
    }

    // --- Not stale ----------------------------------------------------------

    #[test]
    fn test_cache_5_minutes_old_is_not_stale() {
        assert!(
            !is_stale_at(at(12, 55), 15, fixed_now()),
            "5-minute-old cache should not be stale with 15-min threshold"
        );
    }

    #[test]
    fn test_cache_exactly_at_threshold_is_not_stale() {
        assert!(
            !is_stale_at(at(12, 45), 15, fixed_now()),
            "cache exactly at threshold (15 min) should not be stale, \
             staleness is strictly greater than"
        );
    }

    #[test]
    fn test_cache_saved_in_the_future_is_not_stale() {
        assert!(!is_stale_at(at(14, 0), 0, fixed_now()));
    }

    // --- Stale --------------------------------------------------------------

    #[test]
    fn test_cache_one_minute_past_threshold_is_stale() {
        assert!(
            is_stale_at(at(12, 44), 15, fixed_now()),
            "16-minute-old cache should be stale with 15-min threshold"
        );
    }

    #[test]
    fn test_cache_from_2020_is_stale_under_default_threshold() {
        let old = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        assert!(is_stale_at(old, 24 * 60, fixed_now()));
    }

    // --- Origins ------------------------------------------------------------

    #[test]
    fn test_live_and_static_origins_are_never_stale() {
        assert!(!origin_is_stale(&DataOrigin::Live, 0, fixed_now()));
        assert!(!origin_is_stale(&DataOrigin::Static, 0, fixed_now()));
    }

    #[test]
    fn test_cache_without_timestamp_is_stale() {
        assert!(
            origin_is_stale(&DataOrigin::Cache { saved_at: None }, 24 * 60, fixed_now()),
            "unknown cache age should fail safe to stale"
        );
    }

    #[test]
    fn test_recent_cache_origin_is_not_stale() {
        let origin = DataOrigin::Cache { saved_at: Some(at(12, 0)) };
        assert!(!origin_is_stale(&origin, 24 * 60, fixed_now()));
    }
}
