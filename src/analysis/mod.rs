//! Turning a feed payload into a dashboard snapshot.
//!
//! Submodules:
//! - `aggregate`: bucket tallies and the ordered due list.
//! - `pipeline`: normalize, classify and aggregate one payload.

pub mod aggregate;
pub mod pipeline;
