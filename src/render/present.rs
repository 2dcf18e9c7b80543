//! Presenters put the in-memory view in front of an operator.
//!
//! The terminal presenter prints the panel whenever it changes. The GeoJSON
//! presenter rewrites a `FeatureCollection` file that any web map can poll.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use serde_json::{Value, json};
use thiserror::Error;

use crate::render::{DueRow, MapView, PanelState};

#[derive(Debug, Error)]
pub enum PresentError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub trait Presenter {
    fn name(&self) -> &'static str;
    fn present(&mut self, map: &MapView, panel: &PanelState) -> Result<(), PresentError>;
}

// ---------------------------------------------------------------------------
// Terminal
// ---------------------------------------------------------------------------

pub struct TerminalPresenter<W: Write> {
    out: W,
    last: Option<String>,
}

impl TerminalPresenter<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> TerminalPresenter<W> {
    pub fn new(out: W) -> Self {
        Self { out, last: None }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Presenter for TerminalPresenter<W> {
    fn name(&self) -> &'static str {
        "terminal"
    }

    fn present(&mut self, map: &MapView, panel: &PanelState) -> Result<(), PresentError> {
        if panel.loading {
            writeln!(self.out, "Refreshing site feed...")?;
            return Ok(());
        }
        let text = panel_text(map, panel);
        if self.last.as_deref() != Some(text.as_str()) {
            self.out.write_all(text.as_bytes())?;
            self.out.flush()?;
            self.last = Some(text);
        }
        Ok(())
    }
}

/// Plain-text rendering of the panel.
pub fn panel_text(map: &MapView, panel: &PanelState) -> String {
    let c = &panel.counters;
    let mut out = String::new();

    out.push_str(&format!(
        "Sites {} | Due {} | Tomorrow {} | Healthy/after {} | Markers {}\n",
        c.total,
        c.due,
        c.tomorrow,
        c.healthy_or_after,
        map.markers.len()
    ));
    if let Some(date) = panel.last_updated {
        out.push_str(&format!("As of {}\n", date.format("%d %b %Y")));
    }
    if let Some(notice) = &panel.cache_notice {
        let saved = notice
            .saved_at
            .map_or_else(|| "unknown time".to_string(), |t| t.format("%Y-%m-%d %H:%M UTC").to_string());
        let stale = if notice.stale { " (stale)" } else { "" };
        out.push_str(&format!("Showing cached data saved {saved}{stale}\n"));
    }
    if let Some(error) = &panel.error {
        out.push_str(&format!("! Refresh failed: {error}\n"));
    }
    for row in &panel.due_rows {
        match row {
            DueRow::Site {
                name,
                region,
                due_label,
                days_label,
                ..
            } => out.push_str(&format!(
                "  {name:<24} {:<12} {due_label} ({days_label})\n",
                region.as_deref().unwrap_or("-")
            )),
            DueRow::Placeholder { text } => out.push_str(&format!("  {text}\n")),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// GeoJSON
// ---------------------------------------------------------------------------

pub struct GeoJsonPresenter {
    path: PathBuf,
}

impl GeoJsonPresenter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Presenter for GeoJsonPresenter {
    fn name(&self) -> &'static str {
        "geojson"
    }

    fn present(&mut self, map: &MapView, panel: &PanelState) -> Result<(), PresentError> {
        let body = serde_json::to_string_pretty(&feature_collection(map, panel)?)?;
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        // Readers polling the file never see a half-written document.
        let tmp = self.path.with_extension("geojson.tmp");
        fs::write(&tmp, body)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// One Point feature per marker (GeoJSON order is longitude, latitude), with
/// the panel and viewport as foreign members.
pub fn feature_collection(map: &MapView, panel: &PanelState) -> Result<Value, PresentError> {
    let features: Vec<Value> = map
        .markers
        .iter()
        .map(|m| {
            json!({
                "type": "Feature",
                "geometry": {
                    "type": "Point",
                    "coordinates": [m.coordinates.longitude, m.coordinates.latitude],
                },
                "properties": {
                    "name": m.name,
                    "region": m.region,
                    "city": m.city,
                    "bucket": m.bucket,
                    "color": m.color,
                    "due": m.due_label,
                    "days": m.days_label,
                },
            })
        })
        .collect();

    Ok(json!({
        "type": "FeatureCollection",
        "features": features,
        "viewport": serde_json::to_value(map.viewport)?,
        "panel": serde_json::to_value(panel)?,
    }))
}
