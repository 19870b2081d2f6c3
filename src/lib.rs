//! `liquidity-monitor` library crate.
//!
//! The binary (`liq`) is a thin wrapper around this library so that:
//!
//! - retrieval, ingestion and projections are testable without a terminal
//! - the TUI and the one-shot commands share one [`app::pipeline::Session`]
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod builder;
pub mod cli;
pub mod dashboard;
pub mod data;
pub mod domain;
pub mod error;
pub mod io;
pub mod meta;
pub mod plot;
pub mod report;
pub mod surface;
pub mod tui;
