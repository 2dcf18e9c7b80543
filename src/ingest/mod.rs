//! Site feed ingestion.
//!
//! The feed is either a spreadsheet web-app endpoint or a generated file. It
//! returns loosely typed records: a JSON array of objects (possibly wrapped
//! in an object), or a CSV export. This module turns either shape into
//! `RawRecord`s with normalized field names; it does not validate values.
//!
//! Submodules:
//! - `csv_source`: CSV decoding with fixed column positions.
//! - `feed`: HTTP client with caching disabled and a local cached copy.

pub mod csv_source;
pub mod feed;

use std::collections::BTreeMap;

use serde_json::Value;

use crate::config::{CsvColumns, SourceFormat};
use crate::model::{DataOrigin, SourceError};

/// Keys searched, in order, for the record array when the JSON body is an
/// object rather than a bare array.
const WRAPPER_KEYS: &[&str] = &["data", "sites", "records", "rows"];

// ---------------------------------------------------------------------------
// Raw records
// ---------------------------------------------------------------------------

/// One untyped feed record. Keys are stored normalized (see `normalize_key`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    fields: BTreeMap<String, Value>,
}

impl RawRecord {
    pub fn from_json_object(object: serde_json::Map<String, Value>) -> Self {
        let mut record = RawRecord::default();
        for (key, value) in object {
            record.insert(&key, value);
        }
        record
    }

    /// Builds a record of string values. Handy for CSV rows and tests.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut record = RawRecord::default();
        for (key, value) in pairs {
            record.insert(key, Value::String(value.to_string()));
        }
        record
    }

    /// Stores `value` under the normalized form of `key`. When two raw
    /// headers normalize to the same key, the first one wins.
    pub fn insert(&mut self, key: &str, value: Value) {
        self.fields.entry(normalize_key(key)).or_insert(value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(&normalize_key(key))
    }

    /// First value among `aliases` that is present and not blank.
    pub fn first_of(&self, aliases: &[&str]) -> Option<&Value> {
        aliases
            .iter()
            .filter_map(|alias| self.fields.get(*alias))
            .find(|value| !is_blank(value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Canonical form of a field name: trimmed, spaces, dashes and underscores
/// removed, lowercased. `"Site Name"`, `"site_name"` and `"SiteName"` all
/// become `"sitename"`.
pub fn normalize_key(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_'))
        .flat_map(char::to_lowercase)
        .collect()
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// The decoded records of one fetch, plus where they came from.
#[derive(Debug, Clone, PartialEq)]
pub struct SourcePayload {
    pub records: Vec<RawRecord>,
    pub origin: DataOrigin,
}

/// Anything the refresh controller can pull a record list from.
pub trait RecordSource {
    fn fetch(&mut self) -> Result<SourcePayload, SourceError>;
}

// ---------------------------------------------------------------------------
// Body decoding
// ---------------------------------------------------------------------------

/// Resolves `Auto` into JSON or CSV from the content type, then the body.
pub fn detect_format(body: &str, content_type: Option<&str>) -> SourceFormat {
    if let Some(ct) = content_type {
        let ct = ct.to_ascii_lowercase();
        if ct.contains("csv") {
            return SourceFormat::Csv;
        }
        if ct.contains("json") {
            return SourceFormat::Json;
        }
    }
    match body.trim_start().chars().next() {
        Some('[') | Some('{') => SourceFormat::Json,
        _ => SourceFormat::Csv,
    }
}

pub fn decode_body(
    body: &str,
    format: &SourceFormat,
    content_type: Option<&str>,
    columns: &CsvColumns,
) -> Result<Vec<RawRecord>, SourceError> {
    let resolved = match format {
        SourceFormat::Auto => {
            // Apps Script answers with an HTML sign-in page when the
            // deployment is not public.
            if content_type.is_some_and(|ct| ct.to_ascii_lowercase().contains("html")) {
                return Err(SourceError::Parse(
                    "received an HTML page instead of records".to_string(),
                ));
            }
            detect_format(body, content_type)
        }
        other => other.clone(),
    };
    match resolved {
        SourceFormat::Csv => csv_source::decode_csv(body, columns),
        _ => decode_json(body),
    }
}

/// Decodes a JSON array of objects, or an object wrapping one. Elements that
/// are not objects are skipped.
pub fn decode_json(body: &str) -> Result<Vec<RawRecord>, SourceError> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| SourceError::Parse(e.to_string()))?;

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut object) => WRAPPER_KEYS
            .iter()
            .find_map(|key| match object.remove(*key) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            })
            .ok_or_else(|| {
                SourceError::Parse(format!(
                    "JSON object has no record array under any of {:?}",
                    WRAPPER_KEYS
                ))
            })?,
        other => {
            return Err(SourceError::Parse(format!(
                "expected a JSON array of records, got {}",
                json_kind(&other)
            )));
        }
    };

    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(object) => Some(RawRecord::from_json_object(object)),
            _ => None,
        })
        .collect())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_key_folds_case_and_separators() {
        assert_eq!(normalize_key(" Site Name "), "sitename");
        assert_eq!(normalize_key("site_name"), "sitename");
        assert_eq!(normalize_key("Next-Fueling Plan"), "nextfuelingplan");
    }

    #[test]
    fn test_first_of_skips_blank_values() {
        let record = RawRecord::from_json_object(
            json!({ "SiteName": "  ", "site": "RYD-001" })
                .as_object()
                .cloned()
                .unwrap(),
        );
        assert_eq!(
            record.first_of(&["sitename", "site"]),
            Some(&Value::String("RYD-001".into()))
        );
    }

    #[test]
    fn test_first_raw_header_wins_on_collision() {
        let record = RawRecord::from_pairs([("Site Name", "first"), ("site_name", "second")]);
        assert_eq!(record.len(), 1);
        assert_eq!(record.get("sitename"), Some(&Value::String("first".into())));
    }

    #[test]
    fn test_detect_format_prefers_content_type() {
        assert_eq!(detect_format("[]", Some("text/csv; charset=utf-8")), SourceFormat::Csv);
        assert_eq!(detect_format("a,b\n1,2", Some("application/json")), SourceFormat::Json);
        assert_eq!(detect_format("  [{\"a\":1}]", None), SourceFormat::Json);
        assert_eq!(detect_format("name,lat\nA,1", Some("text/plain")), SourceFormat::Csv);
    }

    #[test]
    fn test_auto_format_rejects_html_pages() {
        let result = decode_body(
            "<html><body>Sign in</body></html>",
            &SourceFormat::Auto,
            Some("text/html; charset=utf-8"),
            &CsvColumns::default(),
        );
        assert!(matches!(result, Err(SourceError::Parse(_))));
    }

    #[test]
    fn test_decode_json_accepts_bare_array() {
        let records = decode_json(r#"[{"siteName":"A"},{"siteName":"B"}, 7]"#).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].get("SiteName"), Some(&json!("B")));
    }

    #[test]
    fn test_decode_json_unwraps_data_object() {
        let records = decode_json(r#"{"updated":"today","data":[{"siteName":"A"}]}"#).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_decode_json_rejects_scalars_and_garbage() {
        assert!(matches!(decode_json("42"), Err(SourceError::Parse(_))));
        assert!(matches!(decode_json("<html>"), Err(SourceError::Parse(_))));
        assert!(matches!(decode_json(r#"{"error":"quota"}"#), Err(SourceError::Parse(_))));
    }
}
