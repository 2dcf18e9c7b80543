//! Dashboard view state.
//!
//! `DashboardContext` is built once at startup and passed explicitly to the
//! refresh controller. It holds the in-memory map (markers and viewport),
//! the side panel (counters, due list, indicators), the auto-focus cycle and
//! the presenters that put that state in front of someone.
//!
//! Submodules:
//! - `focus`: cycles the viewport over the due markers.
//! - `present`: terminal and GeoJSON output of the current view.

pub mod focus;
pub mod present;

use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::alert::staleness::origin_is_stale;
use crate::config::Config;
use crate::logging::Channel;
use crate::model::{ClassifiedSite, Coordinates, DashboardSnapshot, DataOrigin, UrgencyBucket};
use focus::FocusCycle;
use present::Presenter;

pub const NO_DUE_SITES: &str = "No sites due for fueling";

// ---------------------------------------------------------------------------
// Map
// ---------------------------------------------------------------------------

/// One drawn site, with everything its detail popup shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub name: String,
    pub region: Option<String>,
    pub city: Option<String>,
    pub coordinates: Coordinates,
    pub bucket: UrgencyBucket,
    pub color: &'static str,
    pub due_label: String,
    pub days_label: String,
}

impl Marker {
    pub fn from_site(site: &ClassifiedSite) -> Self {
        Self {
            name: site.site.name.clone(),
            region: site.site.region.clone(),
            city: site.site.city.clone(),
            coordinates: site.site.coordinates,
            bucket: site.bucket,
            color: site.color,
            due_label: format_due_date(site.site.due_date),
            days_label: format_days(site.days_remaining),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl Bounds {
    /// Smallest box containing every point; `None` for no points.
    pub fn around<'a>(points: impl IntoIterator<Item = &'a Coordinates>) -> Option<Self> {
        points.into_iter().fold(None, |acc, p| {
            Some(match acc {
                None => Bounds {
                    south: p.latitude,
                    west: p.longitude,
                    north: p.latitude,
                    east: p.longitude,
                },
                Some(b) => Bounds {
                    south: b.south.min(p.latitude),
                    west: b.west.min(p.longitude),
                    north: b.north.max(p.latitude),
                    east: b.east.max(p.longitude),
                },
            })
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum Viewport {
    /// Configured start view, shown until the first fit.
    Initial { center: Coordinates, zoom: u8 },
    /// Fit to `bounds` with `padding` pixels on every side.
    Fit { bounds: Bounds, padding: u32 },
    /// Auto-focus on one site.
    Focus { center: Coordinates, zoom: u8 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapView {
    pub markers: Vec<Marker>,
    pub viewport: Viewport,
}

impl MapView {
    pub fn new(center: Coordinates, zoom: u8) -> Self {
        Self {
            markers: Vec::new(),
            viewport: Viewport::Initial { center, zoom },
        }
    }

    pub fn focus(&mut self, center: Coordinates, zoom: u8) {
        self.viewport = Viewport::Focus { center, zoom };
    }
}

// ---------------------------------------------------------------------------
// Panel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DueRow {
    Site {
        name: String,
        region: Option<String>,
        due_label: String,
        days_label: String,
        color: &'static str,
    },
    Placeholder { text: &'static str },
}

/// Shown while the snapshot on screen came from the cached copy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheNotice {
    pub saved_at: Option<DateTime<Utc>>,
    pub stale: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Counters {
    pub total: usize,
    pub due: usize,
    pub tomorrow: usize,
    pub healthy_or_after: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelState {
    pub counters: Counters,
    pub due_rows: Vec<DueRow>,
    pub loading: bool,
    pub error: Option<String>,
    pub cache_notice: Option<CacheNotice>,
    pub refresh_enabled: bool,
    /// Reference date of the snapshot on screen.
    pub last_updated: Option<NaiveDate>,
}

impl Default for PanelState {
    fn default() -> Self {
        Self {
            counters: Counters::default(),
            due_rows: Vec::new(),
            loading: false,
            error: None,
            cache_notice: None,
            refresh_enabled: true,
            last_updated: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct RenderSettings {
    pub due_padding: u32,
    pub all_padding: u32,
    pub focus_interval: Duration,
    pub focus_zoom: u8,
    pub max_cache_age_minutes: u64,
}

impl RenderSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            due_padding: config.map.due_padding,
            all_padding: config.map.all_padding,
            focus_interval: Duration::from_secs(config.refresh.focus_interval_secs),
            focus_zoom: config.refresh.focus_zoom,
            max_cache_age_minutes: config.refresh.max_cache_age_minutes,
        }
    }
}

pub struct DashboardContext {
    pub map: MapView,
    pub panel: PanelState,
    pub focus: FocusCycle,
    settings: RenderSettings,
    presenters: Vec<Box<dyn Presenter>>,
}

impl DashboardContext {
    pub fn new(map: MapView, settings: RenderSettings) -> Self {
        let focus = FocusCycle::new(settings.focus_interval, settings.focus_zoom);
        Self {
            map,
            panel: PanelState::default(),
            focus,
            settings,
            presenters: Vec::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            MapView::new(config.map.center(), config.map.zoom),
            RenderSettings::from_config(config),
        )
    }

    pub fn with_presenter(mut self, presenter: Box<dyn Presenter>) -> Self {
        self.presenters.push(presenter);
        self
    }

    /// Full repaint from `snapshot`. Nothing from the previous render
    /// survives except the viewport when there is nothing to fit.
    pub fn render(&mut self, snapshot: &DashboardSnapshot, now: Instant, wall_now: DateTime<Utc>) {
        self.map.markers.clear();
        self.map
            .markers
            .extend(snapshot.sites.iter().map(Marker::from_site));

        let due_points: Vec<&Coordinates> =
            snapshot.due.iter().map(|s| &s.site.coordinates).collect();
        if let Some(bounds) = Bounds::around(due_points.iter().copied()) {
            self.map.viewport = Viewport::Fit {
                bounds,
                padding: self.settings.due_padding,
            };
        } else if let Some(bounds) = Bounds::around(self.map.markers.iter().map(|m| &m.coordinates)) {
            self.map.viewport = Viewport::Fit {
                bounds,
                padding: self.settings.all_padding,
            };
        }

        self.panel.counters = Counters {
            total: snapshot.total(),
            due: snapshot.counts.due,
            tomorrow: snapshot.counts.tomorrow,
            healthy_or_after: snapshot.counts.healthy_or_after(),
        };
        self.panel.due_rows = if snapshot.due.is_empty() {
            vec![DueRow::Placeholder { text: NO_DUE_SITES }]
        } else {
            snapshot.due.iter().map(due_row).collect()
        };
        self.panel.cache_notice = match snapshot.origin {
            DataOrigin::Live | DataOrigin::Static => None,
            DataOrigin::Cache { saved_at } => Some(CacheNotice {
                saved_at,
                stale: origin_is_stale(
                    &snapshot.origin,
                    self.settings.max_cache_age_minutes,
                    wall_now,
                ),
            }),
        };
        self.panel.last_updated = Some(snapshot.reference_date);

        self.focus
            .restart(due_points.into_iter().copied().collect(), now);

        tracing::debug!(
            channel = %Channel::Render,
            markers = self.map.markers.len(),
            due = snapshot.counts.due,
            "repainted dashboard"
        );
        self.present();
    }

    /// Entering a cycle: loading on, banner off, manual refresh disabled.
    pub fn begin_loading(&mut self) {
        self.panel.loading = true;
        self.panel.error = None;
        self.panel.refresh_enabled = false;
        self.present();
    }

    /// Leaving a cycle, whatever its outcome.
    pub fn end_loading(&mut self) {
        self.panel.loading = false;
        self.panel.refresh_enabled = true;
        self.present();
    }

    /// Raises the error banner. Map and counters are left as they are.
    pub fn show_error(&mut self, message: impl Into<String>) {
        self.panel.error = Some(message.into());
    }

    /// Advances auto-focus if its deadline passed and presents the moved
    /// viewport.
    pub fn tick_focus(&mut self, now: Instant) -> bool {
        let moved = self.focus.tick(now, &mut self.map);
        if moved {
            self.present();
        }
        moved
    }

    fn present(&mut self) {
        for presenter in &mut self.presenters {
            if let Err(e) = presenter.present(&self.map, &self.panel) {
                tracing::warn!(
                    channel = %Channel::Render,
                    presenter = presenter.name(),
                    "presenter failed: {e}"
                );
            }
        }
    }
}

fn due_row(site: &ClassifiedSite) -> DueRow {
    DueRow::Site {
        name: site.site.name.clone(),
        region: site.site.region.clone(),
        due_label: format_due_date(site.site.due_date),
        days_label: format_days(site.days_remaining),
        color: site.color,
    }
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

/// `"05 May 2024"`, or `"n/a"` without a date.
pub fn format_due_date(date: Option<NaiveDate>) -> String {
    date.map_or_else(|| "n/a".to_string(), |d| d.format("%d %b %Y").to_string())
}

/// Signed day count: `"+2d"`, `"0d"`, `"-3d"`, or `"n/a"`.
pub fn format_days(days: Option<i64>) -> String {
    match days {
        Some(0) => "0d".to_string(),
        Some(n) => format!("{n:+}d"),
        None => "n/a".to_string(),
    }
}
