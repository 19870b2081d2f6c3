//! Export the loaded dataset.
//!
//! - CSV: one row per distinct date (ascending), one column per series, empty
//!   fields where a series has no observation
//! - JSON: the series catalog in the shape chart collaborators consume

use std::fs::File;
use std::io::Write;
use std::path::Path;

use clap::ValueEnum;
use serde::Serialize;

use crate::domain::{Dataset, Point, SeriesConfig};
use crate::error::AppError;
use crate::report::join_by_date;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

/// Write the date-joined table as CSV.
pub fn write_csv<W: Write>(writer: W, dataset: &Dataset) -> Result<usize, AppError> {
    let (configs, rows) = join_by_date(dataset);
    let mut wtr = csv::Writer::from_writer(writer);

    let header = std::iter::once("Date").chain(configs.iter().map(|c| c.label.as_str()));
    wtr.write_record(header)
        .map_err(|e| AppError::io(format!("Failed to write export CSV header: {e}")))?;

    for row in &rows {
        let mut record = Vec::with_capacity(row.values.len() + 1);
        record.push(row.date.to_string());
        record.extend(row.values.iter().map(|v| v.map(|x| x.to_string()).unwrap_or_default()));
        wtr.write_record(&record)
            .map_err(|e| AppError::io(format!("Failed to write export CSV row: {e}")))?;
    }

    wtr.flush()
        .map_err(|e| AppError::io(format!("Failed to flush export CSV: {e}")))?;
    Ok(rows.len())
}

/// One catalog entry: the config fields plus its (windowed) points.
#[derive(Debug, Serialize)]
pub struct CatalogEntry<'a> {
    #[serde(flatten)]
    pub config: &'a SeriesConfig,
    pub points: &'a [Point],
}

pub fn catalog_entries(dataset: &Dataset) -> Vec<CatalogEntry<'_>> {
    dataset
        .iter()
        .map(|(config, points)| CatalogEntry { config, points })
        .collect()
}

pub fn write_catalog_json<W: Write>(writer: W, dataset: &Dataset) -> Result<usize, AppError> {
    let entries = catalog_entries(dataset);
    serde_json::to_writer_pretty(writer, &entries)
        .map_err(|e| AppError::io(format!("Failed to write catalog JSON: {e}")))?;
    Ok(entries.len())
}

/// Export to `path`, returning the number of rows (CSV) or series (JSON) written.
pub fn export_to_path(path: &Path, dataset: &Dataset, format: ExportFormat) -> Result<usize, AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::io(format!("Failed to create export file '{}': {e}", path.display())))?;
    match format {
        ExportFormat::Csv => write_csv(file, dataset),
        ExportFormat::Json => write_catalog_json(file, dataset),
    }
}

/// Default export file name: `liquidity_<today>.<ext>`.
pub fn default_export_name(dataset: &Dataset, format: ExportFormat) -> String {
    let ext = match format {
        ExportFormat::Csv => "csv",
        ExportFormat::Json => "json",
    };
    format!("liquidity_{}.{ext}", dataset.today())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::NaiveDate;

    use crate::domain::{RangeWindow, Rgb, Series, SeriesCatalog, Unit};

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn dataset() -> Dataset {
        let catalog = SeriesCatalog::new(vec![
            Series {
                config: SeriesConfig::new("WRESBAL", "Reserves", Unit::MillionsUsd, Rgb(1, 2, 3)),
                points: vec![Point::new(d(1), 100.0), Point::new(d(3), 105.5)],
                skipped: 0,
            },
            Series {
                config: SeriesConfig::new("SOFR", "SOFR", Unit::Percent, Rgb(4, 5, 6)),
                points: vec![Point::new(d(2), 5.3)],
                skipped: 0,
            },
        ])
        .unwrap();
        Dataset::new(Arc::new(catalog), RangeWindow::All, d(10))
    }

    #[test]
    fn csv_is_ascending_with_empty_missing_fields() {
        let mut buf = Vec::new();
        let rows = write_csv(&mut buf, &dataset()).unwrap();
        assert_eq!(rows, 3);
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(
            text,
            "Date,Reserves,SOFR\n2024-01-01,100,\n2024-01-02,,5.3\n2024-01-03,105.5,\n"
        );
    }

    #[test]
    fn json_catalog_flattens_config_and_points() {
        let mut buf = Vec::new();
        assert_eq!(write_catalog_json(&mut buf, &dataset()).unwrap(), 2);
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        let first = &value[0];
        assert_eq!(first["id"], "WRESBAL");
        assert_eq!(first["shortLabel"], "Reserves");
        assert_eq!(first["unit"], "M USD");
        assert_eq!(first["type"], "area");
        assert_eq!(first["axis"], "left");
        assert_eq!(first["points"][1]["dateLabel"], "2024-01-03");
        assert_eq!(first["points"][1]["value"], 105.5);
    }

    #[test]
    fn export_to_path_writes_the_file() {
        let path = std::env::temp_dir().join(format!("liq-export-{}.csv", std::process::id()));
        let rows = export_to_path(&path, &dataset(), ExportFormat::Csv).unwrap();
        assert_eq!(rows, 3);
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("Date,Reserves,SOFR"));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn default_name_uses_today() {
        assert_eq!(default_export_name(&dataset(), ExportFormat::Json), "liquidity_2024-01-10.json");
    }
}
