/// End-to-end refresh cycles against a mock feed
///
/// These tests verify:
/// 1. A live JSON feed is fetched, normalized, classified and rendered
/// 2. A failing cycle after a good one leaves the dashboard untouched
/// 3. An unreachable feed falls back to the cached copy
/// 4. A CSV export with quoted fields and a region filter renders correctly
/// 5. The GeoJSON presenter mirrors what is on screen
///
/// No network access is needed; the feed is served by `mockito`.

use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use fuelmon_service::analysis::pipeline::Pipeline;
use fuelmon_service::config::{Config, parse_config};
use fuelmon_service::ingest::feed::FeedClient;
use fuelmon_service::model::{DataOrigin, SourceError, UrgencyBucket};
use fuelmon_service::refresh::{CycleOutcome, RefreshController, RefreshState};
use fuelmon_service::render::present::GeoJsonPresenter;
use fuelmon_service::render::{DashboardContext, DueRow, NO_DUE_SITES};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

const JSON_FEED: &str = r#"[
    {"siteName": "RYD-001", "regionName": "Central", "cityName": "Riyadh",
     "latitude": 24.1, "longitude": 46.2, "nextFuelingPlan": "2024-05-01"},
    {"siteName": "RYD-002", "regionName": "Central",
     "latitude": "24.3", "longitude": "46.9", "nextFuelingPlan": "2024-05-02"},
    {"siteName": "RYD-003", "regionName": "Central",
     "latitude": 24.5, "nextFuelingPlan": "2024-05-01"}
]"#;

fn config(url: &str, extra: &str) -> Config {
    parse_config(&format!(
        r#"
[source]
url = "{url}"

[clock]
today = "2024-05-01"

[refresh]
interval_minutes = 0

[output]
terminal = false

{extra}
"#
    ))
    .expect("test config should parse")
}

fn controller(config: &Config) -> RefreshController<FeedClient> {
    let client = FeedClient::new(&config.source).expect("client should build");
    RefreshController::new(client, Pipeline::from_config(config), Duration::ZERO)
}

fn wall() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
}

fn toml_path(path: &Path) -> String {
    path.display().to_string().replace('\\', "/")
}

// ---------------------------------------------------------------------------
// Live feed
// ---------------------------------------------------------------------------

#[test]
fn test_live_json_feed_renders_dashboard() {
    let mut server = mockito::Server::new();
    let feed = server
        .mock("GET", "/exec")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(JSON_FEED)
        .create();

    let config = config(&format!("{}/exec", server.url()), "");
    let mut ctrl = controller(&config);
    let mut ctx = DashboardContext::from_config(&config);

    let outcome = ctrl.run_cycle(&mut ctx, Instant::now(), wall());
    feed.assert();

    assert_eq!(outcome, CycleOutcome::Rendered);
    // RYD-003 has no longitude and must not be drawn.
    assert_eq!(ctx.panel.counters.total, 2);
    assert_eq!(ctx.panel.counters.due, 1);
    assert_eq!(ctx.panel.counters.tomorrow, 1);
    assert_eq!(ctx.map.markers.len(), 2);
    assert!(ctx.map.markers.iter().all(|m| m.name != "RYD-003"));
    assert!(matches!(
        &ctx.panel.due_rows[..],
        [DueRow::Site { name, .. }] if name == "RYD-001"
    ));
    assert_eq!(ctrl.last_tally().map(|t| t.dropped()), Some(1));
}

#[test]
fn test_http_500_after_success_keeps_previous_snapshot() {
    let mut server = mockito::Server::new();
    let ok = server
        .mock("GET", "/exec")
        .with_status(200)
        .with_body(JSON_FEED)
        .create();

    let config = config(&format!("{}/exec", server.url()), "");
    let mut ctrl = controller(&config);
    let mut ctx = DashboardContext::from_config(&config);
    assert_eq!(ctrl.run_cycle(&mut ctx, Instant::now(), wall()), CycleOutcome::Rendered);
    let counters = ctx.panel.counters.clone();
    let markers = ctx.map.markers.clone();

    ok.remove();
    let _failing = server.mock("GET", "/exec").with_status(500).create();

    let outcome = ctrl.run_cycle(&mut ctx, Instant::now(), wall());
    assert!(matches!(
        outcome,
        CycleOutcome::Failed(SourceError::HttpStatus { status: 500, .. })
    ));
    assert_eq!(ctrl.state(), RefreshState::Failed);
    assert_eq!(ctx.panel.counters, counters, "counters must not change");
    assert_eq!(ctx.map.markers, markers, "markers must not change");
    assert!(ctx.panel.error.is_some(), "error banner must be shown");
    assert!(!ctx.panel.loading);
}

// ---------------------------------------------------------------------------
// Cache fallback
// ---------------------------------------------------------------------------

#[test]
fn test_outage_falls_back_to_cached_copy() {
    let dir = tempfile::tempdir().unwrap();
    let cache = dir.path().join("sites.json");
    fs::write(&cache, JSON_FEED).unwrap();

    let mut server = mockito::Server::new();
    let _outage = server.mock("GET", "/exec").with_status(503).create();

    let mut config = config(&format!("{}/exec", server.url()), "");
    config.source.cache_path = Some(cache);
    let mut ctrl = controller(&config);
    let mut ctx = DashboardContext::from_config(&config);

    assert_eq!(ctrl.run_cycle(&mut ctx, Instant::now(), wall()), CycleOutcome::Rendered);
    assert_eq!(ctx.panel.counters.total, 2);
    assert!(matches!(
        ctrl.snapshot().map(|s| s.origin),
        Some(DataOrigin::Cache { saved_at: Some(_) })
    ));
    assert!(ctx.panel.cache_notice.is_some(), "cached data must be flagged");
    assert_eq!(ctx.panel.error, None);
}

// ---------------------------------------------------------------------------
// CSV and region filter
// ---------------------------------------------------------------------------

#[test]
fn test_csv_feed_with_region_filter() {
    let body = "Site Name,Region,Latitude,Longitude,Next Fueling Plan\n\
                \"Tower 7, North\",Central,24.1,46.2,2024-05-01\n\
                EST-001,Eastern,26.4,50.1,2024-05-01\n\
                NOREG-1,,25.0,45.0,2024-05-01\n";
    let mut server = mockito::Server::new();
    let _csv = server
        .mock("GET", "/export")
        .with_status(200)
        .with_header("content-type", "text/csv")
        .with_body(body)
        .create();

    let config = config(
        &format!("{}/export", server.url()),
        "[filter]\nregion = \"central\"\n",
    );
    let mut ctrl = controller(&config);
    let mut ctx = DashboardContext::from_config(&config);
    ctrl.run_cycle(&mut ctx, Instant::now(), wall());

    let snapshot = ctrl.snapshot().expect("cycle should render");
    assert_eq!(snapshot.total(), 1, "only the Central record survives");
    assert_eq!(snapshot.sites[0].site.name, "Tower 7, North");
    assert_eq!(snapshot.sites[0].bucket, UrgencyBucket::Due);
}

#[test]
fn test_lenient_region_mode_keeps_rows_without_region() {
    let body = "Site Name,Region,Latitude,Longitude,Next Fueling Plan\n\
                A,Central,24.1,46.2,2024-05-05\n\
                B,,25.0,45.0,2024-05-05\n";
    let mut server = mockito::Server::new();
    let _csv = server
        .mock("GET", "/export")
        .with_status(200)
        .with_body(body)
        .create();

    let config = config(
        &format!("{}/export", server.url()),
        "[filter]\nregion = \"Central\"\nmissing_region = \"include\"\n",
    );
    let mut ctrl = controller(&config);
    let mut ctx = DashboardContext::from_config(&config);
    ctrl.run_cycle(&mut ctx, Instant::now(), wall());

    assert_eq!(ctx.panel.counters.total, 2);
    assert_eq!(ctx.panel.due_rows, vec![DueRow::Placeholder { text: NO_DUE_SITES }]);
}

// ---------------------------------------------------------------------------
// Presenters
// ---------------------------------------------------------------------------

#[test]
fn test_geojson_output_tracks_rendered_markers() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("sites.geojson");

    let mut server = mockito::Server::new();
    let _feed = server
        .mock("GET", "/exec")
        .with_status(200)
        .with_body(JSON_FEED)
        .create();

    let config = config(
        &format!("{}/exec", server.url()),
        &format!("geojson_path = \"{}\"", toml_path(&out)),
    );
    // The extra key lands in the trailing [output] table.
    assert_eq!(config.output.geojson_path.as_deref(), Some(out.as_path()));

    let mut ctrl = controller(&config);
    let mut ctx = DashboardContext::from_config(&config)
        .with_presenter(Box::new(GeoJsonPresenter::new(&out)));
    ctrl.run_cycle(&mut ctx, Instant::now(), wall());

    let doc: Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(doc["features"].as_array().map(Vec::len), Some(2));
    assert_eq!(doc["panel"]["loading"], false);
    assert_eq!(doc["panel"]["counters"]["due"], 1);
}
