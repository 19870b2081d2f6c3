//! Input/output helpers.
//!
//! - cell coercion (`coerce`)
//! - delimited/JSON tabular parsing (`table`)
//! - payload → series catalog (`ingest`)
//! - CSV/JSON exports (`export`)

pub mod coerce;
pub mod export;
pub mod ingest;
pub mod table;

pub use export::*;
pub use ingest::*;
