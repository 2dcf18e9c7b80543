//! Core data types for the fuel-site dashboard.
//!
//! This module defines the shared domain model imported by all other modules.
//! It contains no logic beyond small accessors and no I/O: sites, urgency
//! buckets, snapshots, and the error kinds raised while fetching or
//! normalizing the site feed.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Site types
// ---------------------------------------------------------------------------

/// WGS84 position of a site. Both components are always finite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// A validated fuel site, produced by `normalize::Normalizer` from one
/// raw feed record.
///
/// A `Site` only exists once name, coordinates and due date have all been
/// parsed. `due_date` stays optional so the classifier can still express the
/// `Unknown` bucket for callers that build sites by hand.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Site {
    pub name: String,
    pub region: Option<String>,
    pub city: Option<String>,
    pub coordinates: Coordinates,
    pub due_date: Option<NaiveDate>,
}

// ---------------------------------------------------------------------------
// Classification types
// ---------------------------------------------------------------------------

/// Urgency of a site's next fueling date relative to today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum UrgencyBucket {
    /// Due today or overdue.
    Due,
    Tomorrow,
    AfterTomorrow,
    Healthy,
    /// No resolvable due date.
    Unknown,
}

impl UrgencyBucket {
    pub fn label(self) -> &'static str {
        match self {
            UrgencyBucket::Due => "due",
            UrgencyBucket::Tomorrow => "tomorrow",
            UrgencyBucket::AfterTomorrow => "afterTomorrow",
            UrgencyBucket::Healthy => "healthy",
            UrgencyBucket::Unknown => "unknown",
        }
    }
}

/// A site tagged with its bucket for one refresh cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedSite {
    pub site: Site,
    pub bucket: UrgencyBucket,
    /// Whole days from today to the due date; negative when overdue.
    /// `None` only for the `Unknown` bucket.
    pub days_remaining: Option<i64>,
    /// Display colour, derived 1:1 from `bucket`.
    pub color: &'static str,
}

/// Per-bucket tallies for one snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BucketCounts {
    pub due: usize,
    pub tomorrow: usize,
    pub after_tomorrow: usize,
    pub healthy: usize,
    pub unknown: usize,
}

impl BucketCounts {
    /// Fourth headline counter: healthy and after-tomorrow sites together.
    pub fn healthy_or_after(&self) -> usize {
        self.healthy + self.after_tomorrow
    }

    /// Sites with a resolvable due date. Equals the sum of the headline
    /// due / tomorrow / healthy-or-after counters.
    pub fn dated(&self) -> usize {
        self.due + self.tomorrow + self.healthy_or_after()
    }
}

// ---------------------------------------------------------------------------
// Snapshot types
// ---------------------------------------------------------------------------

/// Where the records of a snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DataOrigin {
    Live,
    /// Served from the local cached copy after the live source failed.
    Cache { saved_at: Option<DateTime<Utc>> },
    /// Read from a configured snapshot file with no live endpoint.
    Static,
}

/// Everything one refresh cycle produced. Immutable once built and replaced
/// wholesale by the next cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSnapshot {
    /// The "today" every site in this snapshot was classified against.
    pub reference_date: NaiveDate,
    pub sites: Vec<ClassifiedSite>,
    pub counts: BucketCounts,
    /// Sites in the `Due` bucket, ascending by due date.
    pub due: Vec<ClassifiedSite>,
    pub origin: DataOrigin,
}

impl DashboardSnapshot {
    /// Number of sites that passed normalization, whatever their bucket.
    pub fn total(&self) -> usize {
        self.sites.len()
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that abort a whole refresh cycle.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SourceError {
    /// Non-2xx HTTP response from the feed.
    #[error("HTTP error: {status} from {url}")]
    HttpStatus { status: u16, url: String },
    /// The request never produced a response (DNS, connect, timeout).
    #[error("request failed: {0}")]
    Network(String),
    /// The response body could not be decoded as JSON or CSV records.
    #[error("parse error: {0}")]
    Parse(String),
    /// The cached copy could not be read while falling back.
    #[error("cache unavailable at {path}: {reason}")]
    Cache { path: String, reason: String },
}

impl SourceError {
    /// `true` for transport-level failures, the ones a cached copy can cover.
    pub fn is_fetch(&self) -> bool {
        matches!(self, SourceError::HttpStatus { .. } | SourceError::Network(_))
    }
}

/// Why a single raw record was dropped during normalization.
///
/// Never fatal and never shown to the user; only logged and tallied.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidRecord {
    #[error("missing site name")]
    MissingName,
    #[error("region {found:?} does not match the target region")]
    RegionMismatch { found: Option<String> },
    #[error("missing {0}")]
    MissingCoordinate(&'static str),
    #[error("invalid {field}: {value:?}")]
    InvalidCoordinate { field: &'static str, value: String },
    #[error("missing next fueling date")]
    MissingDate,
    #[error("invalid date: {0:?}")]
    InvalidDate(String),
}

impl InvalidRecord {
    /// Short stable label, used as a tally key in verification reports.
    pub fn kind(&self) -> &'static str {
        match self {
            InvalidRecord::MissingName => "missing_name",
            InvalidRecord::RegionMismatch { .. } => "region_mismatch",
            InvalidRecord::MissingCoordinate(_) => "missing_coordinate",
            InvalidRecord::InvalidCoordinate { .. } => "invalid_coordinate",
            InvalidRecord::MissingDate => "missing_date",
            InvalidRecord::InvalidDate(_) => "invalid_date",
        }
    }
}
