//! Command-line parsing for the liquidity monitor.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from retrieval/ingestion code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::domain::{RangeWindow, RenderType, ResolverKind, SourceFormat};
use crate::io::ExportFormat;
use crate::report::DATA_TABLE_MAX_ROWS;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "liq",
    version,
    about = "Liquidity Monitor: Fed reserves, TGA, funding rates and Bitcoin in the terminal"
)]
pub struct Cli {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Defaults to `tui` when omitted.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Launch the interactive dashboard.
    Tui,
    /// Print one metric card per series.
    Summary(SummaryArgs),
    /// Print the date-joined data table, newest first.
    Table(TableArgs),
    /// Write the windowed dataset to CSV or JSON.
    Export(ExportArgs),
    /// Render the builder (or overview) chart as ASCII.
    Plot(PlotArgs),
}

/// Options shared by every command.
#[derive(Debug, Clone, Args)]
pub struct CommonArgs {
    /// Range window applied to every series.
    #[arg(short = 'r', long, global = true, value_enum, default_value_t = RangeWindow::All)]
    pub range: RangeWindow,

    /// Data source URL or file path; repeat to add fallbacks (tried in order).
    #[arg(
        short = 's',
        long = "source",
        global = true,
        env = "LIQ_SOURCES",
        value_delimiter = ','
    )]
    pub sources: Vec<String>,

    /// Payload format (auto sniffs JSON vs delimited text).
    #[arg(long = "input-format", global = true, value_enum, default_value_t = SourceFormat::Auto)]
    pub input_format: SourceFormat,

    /// Column metadata strategy (auto = explicit mapping for JSON, heuristics for CSV).
    #[arg(long, global = true, value_enum, default_value_t = ResolverKind::Auto)]
    pub resolver: ResolverKind,

    /// JSON file with extra field mappings (`{ "field": { "id", "label", "unit", "color" } }`).
    #[arg(long, global = true, env = "LIQ_MAPPING", value_name = "JSON")]
    pub mapping: Option<PathBuf>,

    /// Seconds a fetched payload is reused before the next load re-fetches.
    #[arg(long = "ttl-secs", global = true, env = "LIQ_TTL_SECS", default_value_t = 300)]
    pub ttl_secs: u64,

    /// HTTP request timeout in seconds.
    #[arg(long = "timeout-secs", global = true, env = "LIQ_TIMEOUT_SECS", default_value_t = 20)]
    pub timeout_secs: u64,

    /// Append logs to this file (the TUI discards logs otherwise).
    #[arg(long = "log-file", global = true, env = "LIQ_LOG_FILE", value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Debug-level logging (RUST_LOG overrides).
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Args)]
pub struct SummaryArgs {
    /// Compare latest against the window start instead of the previous point.
    #[arg(long)]
    pub window_change: bool,

    /// Print the cards as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Args)]
pub struct TableArgs {
    /// Keep rows whose date contains this text (e.g. `2024-03`).
    #[arg(long)]
    pub filter: Option<String>,

    /// Maximum rows to print.
    #[arg(long, default_value_t = DATA_TABLE_MAX_ROWS)]
    pub limit: usize,
}

#[derive(Debug, Clone, Args)]
pub struct ExportArgs {
    /// Output file (defaults to `liquidity_<date>.<ext>` in the working directory).
    #[arg(short = 'o', long)]
    pub out: Option<PathBuf>,

    #[arg(short = 'f', long, value_enum, default_value_t = ExportFormat::Csv)]
    pub format: ExportFormat,
}

/// Which projection `plot` renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PlotSurface {
    Builder,
    Overview,
}

#[derive(Debug, Clone, Args)]
pub struct PlotArgs {
    #[arg(long, value_enum, default_value_t = PlotSurface::Builder)]
    pub surface: PlotSurface,

    /// Render type for the overview.
    #[arg(long = "type", value_enum, default_value_t = RenderType::Line)]
    pub render: RenderType,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_subcommand_means_tui_defaults() {
        let cli = Cli::try_parse_from(["liq"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.common.range, RangeWindow::All);
    }

    #[test]
    fn globals_parse_after_the_subcommand() {
        let cli = Cli::try_parse_from([
            "liq", "table", "--filter", "2024-03", "-r", "3M", "--source", "a.csv", "--source",
            "https://x/y.json",
        ])
        .unwrap();
        assert_eq!(cli.common.range, RangeWindow::ThreeMonths);
        assert_eq!(cli.common.sources, vec!["a.csv", "https://x/y.json"]);
        match cli.command {
            Some(Command::Table(args)) => {
                assert_eq!(args.filter.as_deref(), Some("2024-03"));
                assert_eq!(args.limit, DATA_TABLE_MAX_ROWS);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn export_format_is_a_subcommand_flag() {
        let cli = Cli::try_parse_from(["liq", "export", "--format", "json", "-o", "out.json"]).unwrap();
        match cli.command {
            Some(Command::Export(args)) => {
                assert_eq!(args.format, ExportFormat::Json);
                assert_eq!(args.out, Some(PathBuf::from("out.json")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
