//! Snapshot aggregation.

use chrono::NaiveDate;

use crate::model::{BucketCounts, ClassifiedSite, DashboardSnapshot, DataOrigin, UrgencyBucket};

/// Tallies every bucket in one pass.
pub fn count_buckets(sites: &[ClassifiedSite]) -> BucketCounts {
    let mut counts = BucketCounts::default();
    for site in sites {
        match site.bucket {
            UrgencyBucket::Due => counts.due += 1,
            UrgencyBucket::Tomorrow => counts.tomorrow += 1,
            UrgencyBucket::AfterTomorrow => counts.after_tomorrow += 1,
            UrgencyBucket::Healthy => counts.healthy += 1,
            UrgencyBucket::Unknown => counts.unknown += 1,
        }
    }
    counts
}

/// The `Due` sites, ascending by due date. The sort is stable, so sites
/// sharing a date keep their feed order.
pub fn due_list(sites: &[ClassifiedSite]) -> Vec<ClassifiedSite> {
    let mut due: Vec<ClassifiedSite> = sites
        .iter()
        .filter(|s| s.bucket == UrgencyBucket::Due)
        .cloned()
        .collect();
    due.sort_by_key(|s| s.site.due_date);
    due
}

/// Builds the snapshot for one cycle. Pure; `sites` keeps its order.
pub fn aggregate(
    sites: Vec<ClassifiedSite>,
    reference_date: NaiveDate,
    origin: DataOrigin,
) -> DashboardSnapshot {
    let counts = count_buckets(&sites);
    let due = due_list(&sites);
    DashboardSnapshot {
        reference_date,
        sites,
        counts,
        due,
        origin,
    }
}
