//! File format adapters
//!
//! Interval formats that can be projected through a chain collection.

pub mod bed;

pub use bed::{project_bed, BedIntervalView, BedParseError, ProjectionStats};
