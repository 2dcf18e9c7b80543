//! Structured logging for the fuel-site dashboard
//!
//! Installs a `tracing` subscriber with an env-filter, optional timestamps
//! and an optional append-only log file for daemon operation. Events carry a
//! `channel` field naming the part of the pipeline they come from, and a
//! `site` field when they concern one record.

use std::fmt;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingSettings;
use crate::model::SourceError;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    #[serde(alias = "warn")]
    Warning,
    Error,
}

impl LogLevel {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "debug" | "trace" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warning),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }

    /// Directive understood by `EnvFilter`.
    pub fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

// ---------------------------------------------------------------------------
// Channels
// ---------------------------------------------------------------------------

/// Pipeline stage an event belongs to, logged as the `channel` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Source,
    Cache,
    Record,
    Render,
    System,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Source => write!(f, "SOURCE"),
            Channel::Cache => write!(f, "CACHE"),
            Channel::Record => write!(f, "RECORD"),
            Channel::Render => write!(f, "RENDER"),
            Channel::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - the feed is briefly offline or being redeployed
    Expected,
    /// Unexpected failure - indicates a broken feed or configuration issue
    Unexpected,
    /// Unknown - cannot determine if this is expected or not
    Unknown,
}

impl FailureType {
    /// Level a failed feed operation is logged at. Never below warn, so a
    /// failed cycle shows up at the default level.
    pub fn log_level(self) -> LogLevel {
        match self {
            FailureType::Expected | FailureType::Unknown => LogLevel::Warning,
            FailureType::Unexpected => LogLevel::Error,
        }
    }
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// ---------------------------------------------------------------------------
// Initialisation
// ---------------------------------------------------------------------------

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
///
/// Returns an error if the log file cannot be opened or a subscriber is
/// already installed.
pub fn init_logger(
    settings: &LoggingSettings,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.level.as_filter()));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    match (&settings.file, settings.timestamps) {
        (Some(path), true) => builder
            .with_ansi(false)
            .with_writer(Mutex::new(open_log_file(path)?))
            .try_init(),
        (Some(path), false) => builder
            .without_time()
            .with_ansi(false)
            .with_writer(Mutex::new(open_log_file(path)?))
            .try_init(),
        (None, true) => builder.try_init(),
        (None, false) => builder.without_time().try_init(),
    }
}

fn open_log_file(path: &Path) -> std::io::Result<std::fs::File> {
    OpenOptions::new().create(true).append(true).open(path)
}

// ---------------------------------------------------------------------------
// Failure Classification Helpers
// ---------------------------------------------------------------------------

/// Classify a feed failure by its kind.
pub fn classify_source_failure(err: &SourceError) -> FailureType {
    match err {
        // Apps Script endpoints answer 429/503 while redeploying or throttled
        SourceError::HttpStatus { status, .. } if matches!(*status, 429 | 502 | 503 | 504) => {
            FailureType::Expected
        }
        SourceError::HttpStatus { .. } => FailureType::Unexpected,
        // Parse errors suggest the sheet layout changed
        SourceError::Parse(_) => FailureType::Unexpected,
        SourceError::Network(_) | SourceError::Cache { .. } => FailureType::Unknown,
    }
}

// ---------------------------------------------------------------------------
// Structured Failure Logging
// ---------------------------------------------------------------------------

/// Log a feed failure with automatic classification
pub fn log_source_failure(channel: Channel, operation: &str, err: &SourceError) {
    let failure_type = classify_source_failure(err);
    let message = format!("{} failed [{}]: {}", operation, failure_type, err);

    match failure_type.log_level() {
        LogLevel::Error => tracing::error!(channel = %channel, "{message}"),
        LogLevel::Warning => tracing::warn!(channel = %channel, "{message}"),
        LogLevel::Info => tracing::info!(channel = %channel, "{message}"),
        LogLevel::Debug => tracing::debug!(channel = %channel, "{message}"),
    }
}

// ---------------------------------------------------------------------------
// Cycle Summary Logging
// ---------------------------------------------------------------------------

/// Log how many raw records survived normalization in one cycle
pub fn log_cycle_summary(total: usize, accepted: usize, dropped: usize) {
    let message = format!(
        "Refresh complete: {}/{} records accepted, {} dropped",
        accepted, total, dropped
    );

    if total > 0 && accepted == 0 {
        tracing::warn!(channel = %Channel::Record, "{message}");
    } else {
        tracing::info!(channel = %Channel::Record, "{message}");
    }
}
