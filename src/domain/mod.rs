//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - presentation enums (`Unit`, `RenderType`, `Axis`, `Category`, `RangeWindow`)
//! - normalized observations (`Point`) and series metadata (`SeriesConfig`)
//! - the built catalog and its range-filtered view (`SeriesCatalog`, `Dataset`)
//! - session configuration (`MonitorConfig`)

pub mod catalog;
pub mod types;

pub use catalog::*;
pub use types::*;
