//! One payload in, one snapshot out.
//!
//! "Today" is sampled once per build and every site is classified against
//! that date, so a cycle that straddles midnight cannot split the map
//! across two days.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::alert::urgency::{UrgencyPolicy, classify_all};
use crate::analysis::aggregate::aggregate;
use crate::clock::ReferenceClock;
use crate::config::Config;
use crate::ingest::{RawRecord, SourcePayload};
use crate::logging::Channel;
use crate::model::{DashboardSnapshot, Site};
use crate::normalize::{NAME, Normalizer};

/// What normalization did with one payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecordTally {
    pub total: usize,
    pub accepted: usize,
    /// Dropped records keyed by `InvalidRecord::kind`.
    pub rejected: BTreeMap<&'static str, usize>,
}

impl RecordTally {
    pub fn dropped(&self) -> usize {
        self.total - self.accepted
    }
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    normalizer: Normalizer,
    clock: ReferenceClock,
    policy: UrgencyPolicy,
}

impl Pipeline {
    pub fn new(normalizer: Normalizer, clock: ReferenceClock, policy: UrgencyPolicy) -> Self {
        Self {
            normalizer,
            clock,
            policy,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let clock = config.reference_clock();
        Self::new(
            Normalizer::new(config.region_filter(), clock.clone()),
            clock,
            config.urgency_policy(),
        )
    }

    /// Validates every record, dropping the ones that fail. Feed order is
    /// preserved.
    pub fn normalize_all(&self, records: &[RawRecord]) -> (Vec<Site>, RecordTally) {
        let mut tally = RecordTally {
            total: records.len(),
            ..RecordTally::default()
        };
        let mut sites = Vec::with_capacity(records.len());

        for raw in records {
            match self.normalizer.try_normalize(raw) {
                Ok(site) => sites.push(site),
                Err(reason) => {
                    let name = raw
                        .first_of(NAME.aliases)
                        .and_then(|v| v.as_str())
                        .unwrap_or("?");
                    tracing::debug!(
                        channel = %Channel::Record,
                        site = name,
                        reason = reason.kind(),
                        "dropped record: {reason}"
                    );
                    *tally.rejected.entry(reason.kind()).or_default() += 1;
                }
            }
        }

        tally.accepted = sites.len();
        (sites, tally)
    }

    /// Normalizes, classifies and aggregates `payload` as of `now`.
    pub fn build(
        &self,
        payload: SourcePayload,
        now: DateTime<Utc>,
    ) -> (DashboardSnapshot, RecordTally) {
        let today = self.clock.today_at(now);
        let (sites, tally) = self.normalize_all(&payload.records);
        let classified = classify_all(sites, today, &self.policy);
        (aggregate(classified, today, payload.origin), tally)
    }
}
