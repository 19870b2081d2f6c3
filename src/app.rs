//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - initialises logging
//! - loads the liquidity feed through a [`pipeline::Session`]
//! - prints summaries/tables/plots or writes exports
//! - hands off to the TUI

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, CommonArgs, ExportArgs, PlotArgs, PlotSurface, SummaryArgs, TableArgs};
use crate::domain::{DEFAULT_SOURCE_URL, MonitorConfig, SourceSpec};
use crate::error::AppError;
use crate::report::ChangeBasis;

pub mod pipeline;

use pipeline::Session;

/// Entry point for the `liq` binary.
pub fn run() -> Result<(), AppError> {
    // `.env` may supply LIQ_* defaults; a missing file is fine.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = monitor_config_from_args(&cli.common);
    let command = cli.command.unwrap_or(Command::Tui);
    init_tracing(&config, matches!(command, Command::Tui))?;

    info!(
        sources = config.sources.len(),
        range = config.range.label(),
        ttl_secs = config.ttl.as_secs(),
        "starting"
    );

    match command {
        Command::Tui => crate::tui::run(config),
        Command::Summary(args) => handle_summary(&config, args),
        Command::Table(args) => handle_table(&config, args),
        Command::Export(args) => handle_export(&config, args),
        Command::Plot(args) => handle_plot(&config, args),
    }
}

pub fn monitor_config_from_args(args: &CommonArgs) -> MonitorConfig {
    let mut sources: Vec<SourceSpec> = args
        .sources
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(SourceSpec::parse)
        .collect();
    if sources.is_empty() {
        sources.push(SourceSpec::Http(DEFAULT_SOURCE_URL.to_string()));
    }

    MonitorConfig {
        sources,
        format: args.input_format,
        resolver: args.resolver,
        mapping_path: args.mapping.clone(),
        ttl: Duration::from_secs(args.ttl_secs),
        http_timeout: Duration::from_secs(args.timeout_secs),
        range: args.range,
        log_file: args.log_file.clone(),
        verbose: args.verbose,
    }
}

/// Log to stderr for one-shot commands. The TUI owns the terminal, so it
/// logs to `--log-file` or nowhere.
fn init_tracing(config: &MonitorConfig, interactive: bool) -> Result<(), AppError> {
    let default_level = if config.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

    let result = match (&config.log_file, interactive) {
        (Some(path), _) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| AppError::io(format!("Failed to open log file '{}': {e}", path.display())))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).try_init()
        }
        (None, true) => builder.with_writer(std::io::sink).try_init(),
        (None, false) => builder.with_writer(std::io::stderr).try_init(),
    };
    result.map_err(|e| AppError::config(format!("Failed to initialise logging: {e}")))
}

/// A session with its first load done.
fn loaded_session(config: &MonitorConfig) -> Result<Session, AppError> {
    let mut session = Session::from_config(config)?;
    session.load()?;
    Ok(session)
}

fn handle_summary(config: &MonitorConfig, args: SummaryArgs) -> Result<(), AppError> {
    let session = loaded_session(config)?;
    let dataset = session.current()?;
    let basis = if args.window_change {
        ChangeBasis::Window
    } else {
        ChangeBasis::Previous
    };
    let cards = crate::report::metric_cards(dataset, session.layout.visible_ids(), basis);

    if args.json {
        let text = serde_json::to_string_pretty(&cards)
            .map_err(|e| AppError::format(format!("Failed to serialise metric cards: {e}")))?;
        println!("{text}");
    } else {
        println!("{}", crate::report::format::format_summary(dataset, &cards));
    }
    Ok(())
}

fn handle_table(config: &MonitorConfig, args: TableArgs) -> Result<(), AppError> {
    let session = loaded_session(config)?;
    let dataset = session.current()?;
    let table = crate::report::data_table(dataset, args.filter.as_deref(), args.limit);
    print!("{}", crate::report::format::format_data_table(&table));
    Ok(())
}

fn handle_export(config: &MonitorConfig, args: ExportArgs) -> Result<(), AppError> {
    let session = loaded_session(config)?;
    let dataset = session.current()?;
    let path = args
        .out
        .unwrap_or_else(|| PathBuf::from(crate::io::default_export_name(dataset, args.format)));
    let written = crate::io::export_to_path(&path, dataset, args.format)?;
    info!(path = %path.display(), written, "export complete");
    println!("Wrote {}", path.display());
    Ok(())
}

fn handle_plot(config: &MonitorConfig, args: PlotArgs) -> Result<(), AppError> {
    let session = loaded_session(config)?;
    let dataset = session.current()?;
    let spec = match args.surface {
        PlotSurface::Builder => crate::surface::project_builder(&session.builder, dataset),
        PlotSurface::Overview => crate::surface::project_overview(dataset, args.render),
    };
    print!("{}", crate::plot::render_chart(&spec, args.width, args.height));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn common(argv: &[&str]) -> CommonArgs {
        Cli::try_parse_from(argv).unwrap().common
    }

    #[test]
    fn default_source_is_the_liquidity_feed() {
        let mut args = common(&["liq"]);
        args.sources.clear();
        let config = monitor_config_from_args(&args);
        assert_eq!(config.sources, vec![SourceSpec::Http(DEFAULT_SOURCE_URL.to_string())]);
    }

    #[test]
    fn sources_keep_their_priority_order() {
        let mut args = common(&["liq", "--ttl-secs", "60"]);
        args.sources = vec!["https://a/feed.json".into(), " ".into(), "local.csv".into()];
        let config = monitor_config_from_args(&args);
        assert_eq!(
            config.sources,
            vec![
                SourceSpec::Http("https://a/feed.json".into()),
                SourceSpec::File(PathBuf::from("local.csv")),
            ]
        );
        assert_eq!(config.ttl, Duration::from_secs(60));
    }
}
