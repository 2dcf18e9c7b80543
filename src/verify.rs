//! Feed Verification Module
//!
//! Fetches the configured feed once, without cache fallback, and reports how
//! many records would make it onto the dashboard and why the rest would not.
//!
//! Use this after changing the sheet layout or pointing at a new endpoint.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::analysis::pipeline::{Pipeline, RecordTally};
use crate::ingest::SourcePayload;
use crate::ingest::feed::FeedClient;
use crate::model::{BucketCounts, DataOrigin, SourceError};

// ============================================================================
// Verification Results
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub timestamp: String,
    pub source: String,
    pub status: VerificationStatus,
    pub reference_date: NaiveDate,
    pub records: RecordTally,
    pub buckets: BucketCounts,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum VerificationStatus {
    /// Every in-region record was accepted, including when there were none.
    Success,
    /// Some in-region records were dropped.
    PartialSuccess,
    /// In-region records exist but none was usable.
    Failed,
}

impl VerificationStatus {
    /// Judged over in-region records only; other regions are filtered out,
    /// not broken.
    pub fn from_tally(tally: &RecordTally) -> Self {
        let out_of_region = tally.rejected.get("region_mismatch").copied().unwrap_or(0);
        let in_scope = tally.total.saturating_sub(out_of_region);
        match (in_scope, tally.accepted) {
            (0, _) => VerificationStatus::Success,
            (_, 0) => VerificationStatus::Failed,
            (in_scope, accepted) if accepted >= in_scope => VerificationStatus::Success,
            _ => VerificationStatus::PartialSuccess,
        }
    }
}

// ============================================================================
// Verification
// ============================================================================

/// Builds the report for an already fetched payload.
pub fn verify_payload(
    payload: SourcePayload,
    source: &str,
    pipeline: &Pipeline,
    now: DateTime<Utc>,
) -> VerificationReport {
    let (snapshot, tally) = pipeline.build(payload, now);
    VerificationReport {
        timestamp: now.to_rfc3339(),
        source: source.to_string(),
        status: VerificationStatus::from_tally(&tally),
        reference_date: snapshot.reference_date,
        records: tally,
        buckets: snapshot.counts,
    }
}

/// Fetches the live feed (or, with no URL configured, the static file) and
/// verifies it. Fetch and parse errors are returned as-is.
pub fn run_verification(
    client: &FeedClient,
    pipeline: &Pipeline,
    now: DateTime<Utc>,
) -> Result<VerificationReport, SourceError> {
    let (payload, source) = match (client.url(), client.cache_path()) {
        (Some(url), _) => {
            let records = client.load_live()?;
            (
                SourcePayload {
                    records,
                    origin: DataOrigin::Live,
                },
                url.to_string(),
            )
        }
        (None, Some(path)) => (client.load_static(path)?, path.display().to_string()),
        (None, None) => {
            return Err(SourceError::Network("no feed url or file configured".to_string()));
        }
    };
    Ok(verify_payload(payload, &source, pipeline, now))
}

pub fn print_summary(report: &VerificationReport) {
    let rule = "=".repeat(60);
    println!("\n{rule}");
    println!("FEED VERIFICATION SUMMARY");
    println!("{rule}");
    println!();
    println!("Source:           {}", report.source);
    println!("Reference date:   {}", report.reference_date);
    println!(
        "Records:          {}/{} accepted  ({} dropped)",
        report.records.accepted,
        report.records.total,
        report.records.dropped()
    );
    for (kind, count) in &report.records.rejected {
        println!("  {kind:<20} {count}");
    }
    println!();
    let b = &report.buckets;
    println!(
        "Buckets:          due {}  tomorrow {}  after tomorrow {}  healthy {}  unknown {}",
        b.due, b.tomorrow, b.after_tomorrow, b.healthy, b.unknown
    );

    let success_rate = if report.records.total > 0 {
        (report.records.accepted as f64 / report.records.total as f64) * 100.0
    } else {
        0.0
    };
    println!();
    println!("Status: {:?} ({:.1}% accepted)", report.status, success_rate);
    println!("{rule}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::urgency::UrgencyPolicy;
    use crate::clock::ReferenceClock;
    use crate::ingest::RawRecord;
    use crate::normalize::{Normalizer, RegionFilter};
    use chrono::TimeZone;

    fn pipeline() -> Pipeline {
        let clock = ReferenceClock::pinned(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        Pipeline::new(
            Normalizer::new(RegionFilter::default(), clock.clone()),
            clock,
            UrgencyPolicy::default(),
        )
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 6, 0, 0).unwrap()
    }

    fn record(name: &str, lat: &str) -> RawRecord {
        RawRecord::from_pairs([
            ("Site", name),
            ("Lat", lat),
            ("Lng", "46.0"),
            ("Next Fuel Date", "2024-05-02"),
        ])
    }

    #[test]
    fn test_status_from_tally() {
        let tally = |total, accepted| RecordTally { total, accepted, ..RecordTally::default() };
        assert_eq!(VerificationStatus::from_tally(&tally(0, 0)), VerificationStatus::Success);
        assert_eq!(VerificationStatus::from_tally(&tally(3, 0)), VerificationStatus::Failed);
        assert_eq!(
            VerificationStatus::from_tally(&tally(3, 2)),
            VerificationStatus::PartialSuccess
        );
        assert_eq!(VerificationStatus::from_tally(&tally(3, 3)), VerificationStatus::Success);
    }

    #[test]
    fn test_other_regions_are_not_failures() {
        let mut tally = RecordTally { total: 4, accepted: 0, ..RecordTally::default() };
        tally.rejected.insert("region_mismatch", 4);
        assert_eq!(
            VerificationStatus::from_tally(&tally),
            VerificationStatus::Success,
            "an empty region result is valid"
        );

        tally.accepted = 1;
        tally.rejected.insert("region_mismatch", 2);
        tally.rejected.insert("invalid_date", 1);
        assert_eq!(
            VerificationStatus::from_tally(&tally),
            VerificationStatus::PartialSuccess
        );
    }

    #[test]
    fn test_report_counts_rejections_and_buckets() {
        let payload = SourcePayload {
            records: vec![record("A", "24.0"), record("B", "north"), record("C", "24.5")],
            origin: DataOrigin::Live,
        };
        let report = verify_payload(payload, "http://feed", &pipeline(), now());

        assert_eq!(report.status, VerificationStatus::PartialSuccess);
        assert_eq!(report.records.accepted, 2);
        assert_eq!(report.records.rejected.get("invalid_coordinate"), Some(&1));
        assert_eq!(report.buckets.tomorrow, 2);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "PartialSuccess");
        assert_eq!(json["records"]["total"], 3);
    }
}
