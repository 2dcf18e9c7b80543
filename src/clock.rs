//! Reference date handling.
//!
//! Every refresh cycle samples "today" exactly once through a
//! `ReferenceClock` and classifies all of its records against that one date.
//! The clock also owns the reference zone, so RFC 3339 timestamps in the feed
//! are truncated to a calendar date in the same zone as "today".
//!
//! For replaying an old export the clock can be pinned to a fixed date or
//! shifted by a number of days.

use chrono::{DateTime, Days, FixedOffset, Local, NaiveDate, Offset, TimeZone, Utc};

/// Largest accepted `days_offset` in either direction, about a century.
pub const MAX_DAYS_OFFSET: u64 = 36_525;

/// The zone in which day boundaries are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceZone {
    /// The host's local zone.
    Local,
    Fixed(FixedOffset),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceClock {
    pub zone: ReferenceZone,
    /// Overrides the system date entirely.
    pub pinned_today: Option<NaiveDate>,
    /// Added to the computed date; negative values replay the past.
    pub days_offset: i64,
}

impl Default for ReferenceClock {
    fn default() -> Self {
        Self {
            zone: ReferenceZone::Local,
            pinned_today: None,
            days_offset: 0,
        }
    }
}

impl ReferenceClock {
    /// A clock frozen on `date`, in UTC. Used by tests and `--today`.
    pub fn pinned(date: NaiveDate) -> Self {
        Self {
            zone: ReferenceZone::Fixed(Utc.fix()),
            pinned_today: Some(date),
            days_offset: 0,
        }
    }

    /// Today's date as seen at instant `now`. Use this in tests to stay
    /// deterministic.
    pub fn today_at(&self, now: DateTime<Utc>) -> NaiveDate {
        let base = self.pinned_today.unwrap_or_else(|| self.date_of(now));
        shift_days(base, self.days_offset).unwrap_or(if self.days_offset < 0 {
            NaiveDate::MIN
        } else {
            NaiveDate::MAX
        })
    }

    /// Calendar date of `instant` in the reference zone.
    pub fn date_of<Tz: TimeZone>(&self, instant: DateTime<Tz>) -> NaiveDate {
        match self.zone {
            ReferenceZone::Local => instant.with_timezone(&Local).date_naive(),
            ReferenceZone::Fixed(offset) => instant.with_timezone(&offset).date_naive(),
        }
    }
}

/// `date` moved by `days`, or `None` outside chrono's calendar.
fn shift_days(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    let step = Days::new(days.unsigned_abs());
    if days < 0 {
        date.checked_sub_days(step)
    } else {
        date.checked_add_days(step)
    }
}
