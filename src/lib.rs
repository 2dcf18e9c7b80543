//! Fuel-site monitoring dashboard.
//!
//! Fetches the fuel-site feed, drops records that fail validation, buckets
//! every site by how soon it needs fuel and keeps a map plus due list up to
//! date on a timer or on demand.

pub mod alert;
pub mod analysis;
pub mod clock;
pub mod config;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod normalize;
pub mod refresh;
pub mod render;
pub mod schedule;
pub mod verify;
