//! CSV decoding for spreadsheet exports.
//!
//! Exports keep their columns in a documented order, so fields are located
//! by fixed position first. A position is trusted only when the header found
//! there is one of the field's aliases; otherwise the header row is searched
//! by alias, and as a last resort the bare position is used when no other
//! field's header names that column. Quoted fields
//! (embedded commas, doubled quotes) are handled by the `csv` reader.

use serde_json::Value;

use crate::config::CsvColumns;
use crate::ingest::{RawRecord, normalize_key};
use crate::model::SourceError;
use crate::normalize::{CITY, DUE_DATE, Field, LATITUDE, LONGITUDE, NAME, REGION};

/// Where each field was found in the header row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLayout {
    /// `(canonical key, column index)`; the canonical key is the field's
    /// first alias, so the normalizer always finds it.
    pub columns: Vec<(&'static str, usize)>,
}

/// Resolves every field's column against the normalized header row.
pub fn resolve_layout(headers: &[String], positions: &CsvColumns) -> ColumnLayout {
    let fields: [(&Field, Option<usize>); 6] = [
        (&NAME, positions.name),
        (&REGION, positions.region),
        (&CITY, positions.city),
        (&LATITUDE, positions.latitude),
        (&LONGITUDE, positions.longitude),
        (&DUE_DATE, positions.due_date),
    ];

    // Header matches first, so a bare position never takes a column that
    // another field's header already names.
    let claimed: Vec<Option<usize>> = fields
        .iter()
        .map(|&(field, position)| by_header(field, position, headers))
        .collect();

    let mut columns = Vec::new();
    for (&(field, position), &found) in fields.iter().zip(&claimed) {
        let idx = found.or_else(|| {
            position.filter(|&pos| pos < headers.len() && !claimed.contains(&Some(pos)))
        });
        if let Some(idx) = idx {
            columns.push((field.aliases[0], idx));
        }
    }
    ColumnLayout { columns }
}

fn by_header(field: &Field, position: Option<usize>, headers: &[String]) -> Option<usize> {
    let header_matches = |idx: usize| {
        headers
            .get(idx)
            .is_some_and(|h| field.aliases.contains(&h.as_str()))
    };

    if let Some(pos) = position.filter(|&pos| header_matches(pos)) {
        return Some(pos);
    }
    let by_name = field
        .aliases
        .iter()
        .find_map(|alias| headers.iter().position(|h| h == alias));
    if by_name.is_some() && position.is_some() {
        tracing::debug!(
            field = field.label,
            "CSV column position unreliable, matched by header name"
        );
    }
    by_name
}

/// Decodes a CSV document with a header row into raw records.
///
/// Fails with `SourceError::Parse` on malformed CSV or when none of the
/// header cells is a known field name (an error page rather than an export).
pub fn decode_csv(body: &str, positions: &CsvColumns) -> Result<Vec<RawRecord>, SourceError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| SourceError::Parse(format!("CSV header: {e}")))?
        .iter()
        .map(normalize_key)
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Ok(Vec::new());
    }
    let known = [&NAME, &REGION, &CITY, &LATITUDE, &LONGITUDE, &DUE_DATE];
    if !headers
        .iter()
        .any(|h| known.iter().any(|f| f.aliases.contains(&h.as_str())))
    {
        return Err(SourceError::Parse(format!(
            "CSV header has no recognised columns: {headers:?}"
        )));
    }

    let layout = resolve_layout(&headers, positions);
    let mut records = Vec::new();

    for (line, row) in reader.records().enumerate() {
        let row = row.map_err(|e| SourceError::Parse(format!("CSV row {}: {e}", line + 2)))?;
        if row.iter().all(|cell| cell.is_empty()) {
            continue;
        }
        let mut record = RawRecord::default();
        for (key, idx) in &layout.columns {
            if let Some(cell) = row.get(*idx) {
                record.insert(key, Value::String(cell.to_string()));
            }
        }
        records.push(record);
    }

    Ok(records)
}
