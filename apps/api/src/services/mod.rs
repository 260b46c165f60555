//! Services behind the route handlers.
//!
//! Handlers stay thin: anything that touches more than one repository, runs
//! in the background or calls out over HTTP lives here.

pub mod ad_insights;
pub mod aggregation;
pub mod bulk;
pub mod csv_io;
