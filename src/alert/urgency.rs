//! Due-date urgency buckets.
//!
//! All functions take `today` as a parameter rather than reading the clock,
//! so one refresh cycle classifies every site against the same date and
//! tests stay deterministic.

use chrono::NaiveDate;

use crate::model::{ClassifiedSite, Site, UrgencyBucket};

pub const COLOR_DUE: &str = "#dc3545";
pub const COLOR_TOMORROW: &str = "#fd7e14";
pub const COLOR_AFTER_TOMORROW: &str = "#ffc107";
pub const COLOR_HEALTHY: &str = "#28a745";

/// Where `AfterTomorrow` ends and `Healthy` begins.
///
/// With `healthy_from_days == 3` a site due in exactly two days is
/// `AfterTomorrow`. With `2` that bucket is never produced and those sites
/// are `Healthy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UrgencyPolicy {
    pub healthy_from_days: i64,
}

impl Default for UrgencyPolicy {
    fn default() -> Self {
        Self { healthy_from_days: 3 }
    }
}

/// Buckets `due` against `today`. Returns the bucket and the signed number
/// of whole days remaining (`None` when there is no due date).
///
/// First match wins:
///   no date        -> Unknown
///   days <= 0      -> Due (today or overdue)
///   days == 1      -> Tomorrow
///   days <  policy -> AfterTomorrow
///   otherwise      -> Healthy
pub fn classify(
    due: Option<NaiveDate>,
    today: NaiveDate,
    policy: &UrgencyPolicy,
) -> (UrgencyBucket, Option<i64>) {
    let Some(due) = due else {
        return (UrgencyBucket::Unknown, None);
    };
    let days = (due - today).num_days();
    let bucket = if days <= 0 {
        UrgencyBucket::Due
    } else if days == 1 {
        UrgencyBucket::Tomorrow
    } else if days < policy.healthy_from_days {
        UrgencyBucket::AfterTomorrow
    } else {
        UrgencyBucket::Healthy
    };
    (bucket, Some(days))
}

/// Fixed display colour per bucket. Unknown shares the healthy colour so an
/// undated site never looks urgent.
pub fn bucket_color(bucket: UrgencyBucket) -> &'static str {
    match bucket {
        UrgencyBucket::Due => COLOR_DUE,
        UrgencyBucket::Tomorrow => COLOR_TOMORROW,
        UrgencyBucket::AfterTomorrow => COLOR_AFTER_TOMORROW,
        UrgencyBucket::Healthy | UrgencyBucket::Unknown => COLOR_HEALTHY,
    }
}

pub fn classify_site(site: Site, today: NaiveDate, policy: &UrgencyPolicy) -> ClassifiedSite {
    let (bucket, days_remaining) = classify(site.due_date, today, policy);
    ClassifiedSite {
        site,
        bucket,
        days_remaining,
        color: bucket_color(bucket),
    }
}

/// Classifies a batch in input order.
pub fn classify_all(
    sites: Vec<Site>,
    today: NaiveDate,
    policy: &UrgencyPolicy,
) -> Vec<ClassifiedSite> {
    sites
        .into_iter()
        .map(|site| classify_site(site, today, policy))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    fn in_days(n: i64) -> Option<NaiveDate> {
        Some(today() + Duration::days(n))
    }

    const DEFAULT: UrgencyPolicy = UrgencyPolicy { healthy_from_days: 3 };
    const COLLAPSED: UrgencyPolicy = UrgencyPolicy { healthy_from_days: 2 };

    #[test]
    fn test_today_is_due() {
        assert_eq!(classify(in_days(0), today(), &DEFAULT), (UrgencyBucket::Due, Some(0)));
    }

    #[test]
    fn test_overdue_is_due_with_negative_days() {
        assert_eq!(classify(in_days(-4), today(), &DEFAULT), (UrgencyBucket::Due, Some(-4)));
    }

    #[test]
    fn test_tomorrow() {
        assert_eq!(
            classify(in_days(1), today(), &DEFAULT),
            (UrgencyBucket::Tomorrow, Some(1))
        );
    }

    #[test]
    fn test_two_days_out_depends_on_policy() {
        assert_eq!(
            classify(in_days(2), today(), &DEFAULT),
            (UrgencyBucket::AfterTomorrow, Some(2))
        );
        assert_eq!(
            classify(in_days(2), today(), &COLLAPSED),
            (UrgencyBucket::Healthy, Some(2))
        );
    }

    #[test]
    fn test_three_or_more_days_is_healthy() {
        assert_eq!(classify(in_days(3), today(), &DEFAULT).0, UrgencyBucket::Healthy);
        assert_eq!(classify(in_days(90), today(), &DEFAULT).0, UrgencyBucket::Healthy);
    }

    #[test]
    fn test_missing_date_is_unknown() {
        assert_eq!(classify(None, today(), &DEFAULT), (UrgencyBucket::Unknown, None));
    }

    #[test]
    fn test_day_count_is_exact_across_month_and_leap_boundaries() {
        let feb_28 = NaiveDate::from_ymd_opt(2024, 2, 28).unwrap();
        let mar_1 = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(
            classify(Some(mar_1), feb_28, &DEFAULT),
            (UrgencyBucket::AfterTomorrow, Some(2))
        );
    }

    #[test]
    fn test_classify_is_repeatable() {
        for n in -3..6 {
            assert_eq!(
                classify(in_days(n), today(), &DEFAULT),
                classify(in_days(n), today(), &DEFAULT)
            );
        }
    }

    #[test]
    fn test_unknown_never_gets_an_urgent_colour() {
        assert_eq!(bucket_color(UrgencyBucket::Unknown), bucket_color(UrgencyBucket::Healthy));
        assert_ne!(bucket_color(UrgencyBucket::Due), bucket_color(UrgencyBucket::Tomorrow));
        assert_ne!(
            bucket_color(UrgencyBucket::Tomorrow),
            bucket_color(UrgencyBucket::AfterTomorrow)
        );
    }
}
