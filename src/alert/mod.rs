//! Urgency classification of fuel sites.
//!
//! Submodules:
//! - `urgency`: buckets a due date relative to today and picks its colour.
//! - `staleness`: flags cached feed copies that are too old to trust.

pub mod staleness;
pub mod urgency;
