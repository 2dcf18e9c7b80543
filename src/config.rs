//! Service configuration.
//!
//! Settings live in a TOML file (`fuelmon.toml` by default). Every key is
//! optional; anything left out falls back to the defaults below. A `.env`
//! file and the `FUELMON_*` environment variables are applied on top of the
//! file, so deployments can point the dashboard at another feed or region
//! without editing it.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{FixedOffset, NaiveDate};
use serde::Deserialize;
use thiserror::Error;

use crate::alert::urgency::UrgencyPolicy;
use crate::clock::{MAX_DAYS_OFFSET, ReferenceClock, ReferenceZone};
use crate::logging::LogLevel;
use crate::model::Coordinates;
use crate::normalize::{MissingRegion, RegionFilter};

pub const DEFAULT_CONFIG_PATH: &str = "fuelmon.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: String, reason: String },
    #[error("invalid environment variable {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

// ---------------------------------------------------------------------------
// File sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    #[default]
    Auto,
    Json,
    Csv,
}

/// Zero-based CSV column positions. A position is only trusted when the
/// header found there is one of the field's aliases.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CsvColumns {
    pub name: Option<usize>,
    pub region: Option<usize>,
    pub city: Option<usize>,
    pub latitude: Option<usize>,
    pub longitude: Option<usize>,
    pub due_date: Option<usize>,
}

impl Default for CsvColumns {
    fn default() -> Self {
        Self {
            name: Some(0),
            region: Some(1),
            city: None,
            latitude: Some(2),
            longitude: Some(3),
            due_date: Some(4),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    pub url: Option<String>,
    pub format: SourceFormat,
    pub cache_path: Option<PathBuf>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    pub csv_columns: CsvColumns,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            url: None,
            format: SourceFormat::Auto,
            cache_path: None,
            timeout_secs: default_timeout_secs(),
            csv_columns: CsvColumns::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    pub region: Option<String>,
    pub missing_region: MissingRegion,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClassificationSettings {
    pub healthy_from_days: i64,
}

impl Default for ClassificationSettings {
    fn default() -> Self {
        Self { healthy_from_days: 3 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClockSettings {
    pub utc_offset_minutes: Option<i32>,
    pub today: Option<NaiveDate>,
    pub days_offset: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RefreshSettings {
    /// 0 loads once and exits.
    pub interval_minutes: u64,
    /// 0 disables auto-focus.
    pub focus_interval_secs: u64,
    pub focus_zoom: u8,
    pub max_cache_age_minutes: u64,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            interval_minutes: 15,
            focus_interval_secs: 8,
            focus_zoom: 14,
            max_cache_age_minutes: 24 * 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MapSettings {
    pub center: [f64; 2],
    pub zoom: u8,
    pub due_padding: u32,
    pub all_padding: u32,
}

impl Default for MapSettings {
    fn default() -> Self {
        Self {
            center: [24.7136, 46.6753],
            zoom: 6,
            due_padding: 60,
            all_padding: 20,
        }
    }
}

impl MapSettings {
    pub fn center(&self) -> Coordinates {
        Coordinates {
            latitude: self.center[0],
            longitude: self.center[1],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub geojson_path: Option<PathBuf>,
    pub terminal: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            geojson_path: None,
            terminal: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: LogLevel,
    pub file: Option<PathBuf>,
    pub timestamps: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            file: None,
            timestamps: true,
        }
    }
}

/// The whole configuration file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceSettings,
    pub filter: FilterSettings,
    pub classification: ClassificationSettings,
    pub clock: ClockSettings,
    pub refresh: RefreshSettings,
    pub map: MapSettings,
    pub output: OutputSettings,
    pub logging: LoggingSettings,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Loads `path` (missing file means all defaults), applies `.env` and the
/// process environment, and validates the result.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    dotenv::dotenv().ok();
    let mut config = if path.exists() {
        read_config_file(path)?
    } else {
        Config::default()
    };
    apply_env_overrides(&mut config, |key| std::env::var(key))?;
    config.validate()?;
    Ok(config)
}

pub fn read_config_file(path: &Path) -> Result<Config, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_config(&text)
}

pub fn parse_config(text: &str) -> Result<Config, ConfigError> {
    Ok(toml::from_str(text)?)
}

/// Applies `FUELMON_*` overrides read through `lookup`.
///
/// Taking the lookup as a parameter keeps this testable with a plain map,
/// without `set_var`.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let non_empty = |var: &str| lookup(var).ok().filter(|v| !v.trim().is_empty());

    if let Some(url) = non_empty("FUELMON_SOURCE_URL") {
        config.source.url = Some(url);
    }
    if let Some(path) = non_empty("FUELMON_CACHE_PATH") {
        config.source.cache_path = Some(PathBuf::from(path));
    }
    if let Some(region) = non_empty("FUELMON_REGION") {
        config.filter.region = Some(region);
    }
    if let Some(raw) = non_empty("FUELMON_INTERVAL_MINUTES") {
        let minutes = raw.trim().parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: "FUELMON_INTERVAL_MINUTES".to_string(),
            reason: e.to_string(),
        })?;
        config.refresh.interval_minutes = minutes;
    }
    if let Some(raw) = non_empty("FUELMON_LOG_LEVEL") {
        config.logging.level =
            LogLevel::parse(&raw).ok_or_else(|| ConfigError::InvalidEnvVar {
                var: "FUELMON_LOG_LEVEL".to_string(),
                reason: format!("unknown level {raw:?}"),
            })?;
    }
    Ok(())
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source.url.is_none() && self.source.cache_path.is_none() {
            return Err(invalid("source.url", "set a feed url or a cache_path"));
        }
        if !matches!(self.classification.healthy_from_days, 2 | 3) {
            return Err(invalid(
                "classification.healthy_from_days",
                format!("must be 2 or 3, got {}", self.classification.healthy_from_days),
            ));
        }
        if let Some(minutes) = self.clock.utc_offset_minutes {
            if fixed_offset(minutes).is_none() {
                return Err(invalid("clock.utc_offset_minutes", "offset out of range"));
            }
        }
        if self.clock.days_offset.unsigned_abs() > MAX_DAYS_OFFSET {
            return Err(invalid(
                "clock.days_offset",
                format!("must be within ±{MAX_DAYS_OFFSET} days"),
            ));
        }

        let cols = &self.source.csv_columns;
        let positions: Vec<usize> = [
            cols.name,
            cols.region,
            cols.city,
            cols.latitude,
            cols.longitude,
            cols.due_date,
        ]
        .into_iter()
        .flatten()
        .collect();
        for (i, pos) in positions.iter().enumerate() {
            if positions[i + 1..].contains(pos) {
                return Err(invalid(
                    "source.csv_columns",
                    format!("column {pos} assigned to more than one field"),
                ));
            }
        }
        Ok(())
    }

    pub fn urgency_policy(&self) -> UrgencyPolicy {
        UrgencyPolicy {
            healthy_from_days: self.classification.healthy_from_days,
        }
    }

    pub fn region_filter(&self) -> RegionFilter {
        RegionFilter {
            target: self.filter.region.clone(),
            missing: self.filter.missing_region,
        }
    }

    pub fn reference_clock(&self) -> ReferenceClock {
        let zone = self
            .clock
            .utc_offset_minutes
            .and_then(fixed_offset)
            .map(ReferenceZone::Fixed)
            .unwrap_or(ReferenceZone::Local);
        ReferenceClock {
            zone,
            pinned_today: self.clock.today,
            days_offset: self.clock.days_offset,
        }
    }
}

fn fixed_offset(minutes: i32) -> Option<FixedOffset> {
    minutes.checked_mul(60).and_then(FixedOffset::east_opt)
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        reason: reason.into(),
    }
}
