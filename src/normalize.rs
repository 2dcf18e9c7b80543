//! Record normalization.
//!
//! Turns one `RawRecord` into a validated `Site`, or rejects it. Each logical
//! field has an ordered alias list; the first alias present with a non-blank
//! value is used. A record is dropped if its name, region, either coordinate
//! or its due date fails, so nothing downstream ever sees a placeholder
//! value.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use serde_json::Value;

use crate::clock::ReferenceClock;
use crate::ingest::RawRecord;
use crate::model::{Coordinates, InvalidRecord, Site};

// ---------------------------------------------------------------------------
// Field aliases
// ---------------------------------------------------------------------------

/// A logical field and the normalized raw keys accepted for it, in priority
/// order.
#[derive(Debug)]
pub struct Field {
    pub label: &'static str,
    pub aliases: &'static [&'static str],
}

pub const NAME: Field = Field {
    label: "site name",
    aliases: &["sitename", "site", "name", "siteno", "sitenumber", "siteid", "cowid"],
};

pub const REGION: Field = Field {
    label: "region",
    aliases: &["regionname", "region", "zone", "area"],
};

pub const CITY: Field = Field {
    label: "city",
    aliases: &["cityname", "city", "location", "municipality"],
};

pub const LATITUDE: Field = Field {
    label: "latitude",
    aliases: &["latitude", "lat"],
};

pub const LONGITUDE: Field = Field {
    label: "longitude",
    aliases: &["longitude", "lng", "lon", "long"],
};

pub const DUE_DATE: Field = Field {
    label: "next fueling date",
    aliases: &[
        "nextfuelingplan",
        "nextfueldate",
        "nextfuelingdate",
        "nextfueling",
        "nextfuel",
        "fueldate",
        "duedate",
        "nextdue",
    ],
};

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d-%b-%Y"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

// ---------------------------------------------------------------------------
// Region filter
// ---------------------------------------------------------------------------

/// What to do with records that carry no region while a target is set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingRegion {
    /// Strict: a record without a region is out of scope.
    #[default]
    Reject,
    /// Lenient: keep it.
    Include,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionFilter {
    /// `None` disables filtering entirely.
    pub target: Option<String>,
    pub missing: MissingRegion,
}

impl RegionFilter {
    /// Case-insensitive comparison against the target region.
    pub fn admits(&self, region: Option<&str>) -> bool {
        let Some(target) = &self.target else {
            return true;
        };
        match region {
            Some(region) => region.trim().to_lowercase() == target.trim().to_lowercase(),
            None => self.missing == MissingRegion::Include,
        }
    }
}

// ---------------------------------------------------------------------------
// Normalizer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Normalizer {
    region: RegionFilter,
    clock: ReferenceClock,
}

impl Normalizer {
    /// `clock` supplies the zone used to truncate timestamped due dates.
    pub fn new(region: RegionFilter, clock: ReferenceClock) -> Self {
        Self { region, clock }
    }

    /// Returns the validated site, or `None` if any required field fails.
    pub fn normalize(&self, raw: &RawRecord) -> Option<Site> {
        self.try_normalize(raw).ok()
    }

    /// Like `normalize`, but says why a record was dropped.
    pub fn try_normalize(&self, raw: &RawRecord) -> Result<Site, InvalidRecord> {
        let name = raw
            .first_of(NAME.aliases)
            .and_then(value_text)
            .ok_or(InvalidRecord::MissingName)?;

        let region = raw.first_of(REGION.aliases).and_then(value_text);
        if !self.region.admits(region.as_deref()) {
            return Err(InvalidRecord::RegionMismatch { found: region });
        }

        let latitude = parse_coordinate(raw.first_of(LATITUDE.aliases), "latitude")?;
        let longitude = parse_coordinate(raw.first_of(LONGITUDE.aliases), "longitude")?;

        let due_value = raw
            .first_of(DUE_DATE.aliases)
            .ok_or(InvalidRecord::MissingDate)?;
        let due_date = match due_value {
            Value::String(s) => parse_due_date(s, &self.clock)?,
            other => return Err(InvalidRecord::InvalidDate(other.to_string())),
        };

        Ok(Site {
            name,
            region,
            city: raw.first_of(CITY.aliases).and_then(value_text),
            coordinates: Coordinates { latitude, longitude },
            due_date: Some(due_date),
        })
    }
}

/// Trimmed text of a string, number or boolean value.
fn value_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Parses a coordinate given as a JSON number or numeric string. Rejects
/// anything missing or non-finite.
pub fn parse_coordinate(value: Option<&Value>, field: &'static str) -> Result<f64, InvalidRecord> {
    let value = value.ok_or(InvalidRecord::MissingCoordinate(field))?;
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|v| v.is_finite())
        .ok_or_else(|| InvalidRecord::InvalidCoordinate {
            field,
            value: match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            },
        })
}

/// Parses an ISO-like date string into a calendar date.
///
/// RFC 3339 timestamps are converted into the clock's reference zone before
/// the time of day is dropped; naive timestamps are truncated as written.
pub fn parse_due_date(raw: &str, clock: &ReferenceClock) -> Result<NaiveDate, InvalidRecord> {
    let s = raw.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(s) {
        return Ok(clock.date_of(instant));
    }
    if let Some(dt) = DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
    {
        return Ok(dt.date());
    }
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
        .ok_or_else(|| InvalidRecord::InvalidDate(raw.to_string()))
}
