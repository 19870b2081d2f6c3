//! Reporting utilities: derived statistics, metric cards, and the date-joined table.

pub mod format;
pub mod window;

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::{Dataset, Point, Rgb, SeriesConfig, Unit};
use crate::report::format::format_value;

/// Absolute and percent change between two observations.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Change {
    pub value: f64,
    pub pct: f64,
}

impl Change {
    pub const ZERO: Change = Change { value: 0.0, pct: 0.0 };

    /// `a` relative to `b`. A reference of exactly zero yields `ZERO`.
    pub fn between(a: f64, b: f64) -> Self {
        if b == 0.0 {
            return Change::ZERO;
        }
        Change {
            value: a - b,
            pct: (a - b) / b.abs() * 100.0,
        }
    }
}

pub fn latest(points: &[Point]) -> Option<&Point> {
    points.last()
}

/// Last point vs the one before it.
pub fn change_from_previous(points: &[Point]) -> Change {
    match points {
        [.., b, a] => Change::between(a.value, b.value),
        _ => Change::ZERO,
    }
}

/// Last point vs the first point of the (already windowed) sequence.
pub fn change_over_window(points: &[Point]) -> Change {
    match points {
        [b, .., a] => Change::between(a.value, b.value),
        _ => Change::ZERO,
    }
}

/// Direction marker shown next to a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Flat,
}

impl Trend {
    /// Moves smaller than a thousandth of a percent count as flat.
    pub fn from_pct(pct: f64) -> Self {
        if pct.abs() < 0.001 {
            Trend::Flat
        } else if pct > 0.0 {
            Trend::Up
        } else {
            Trend::Down
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Trend::Up => "▲",
            Trend::Down => "▼",
            Trend::Flat => "■",
        }
    }
}

/// Which reference a card's change is computed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeBasis {
    /// Point-over-point (dashboard metric cards).
    Previous,
    /// Window start to latest (miniature cards).
    Window,
}

/// Everything a card collaborator needs for one series.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricCard {
    pub id: String,
    pub label: String,
    pub short_label: String,
    pub unit: Unit,
    pub color: Rgb,
    pub latest: Option<f64>,
    pub latest_date: Option<NaiveDate>,
    pub formatted: String,
    pub change: Change,
    pub trend: Trend,
}

pub fn metric_card(config: &SeriesConfig, points: &[Point], basis: ChangeBasis) -> MetricCard {
    let last = latest(points);
    let change = match basis {
        ChangeBasis::Previous => change_from_previous(points),
        ChangeBasis::Window => change_over_window(points),
    };
    MetricCard {
        id: config.id.clone(),
        label: config.label.clone(),
        short_label: config.short_label.clone(),
        unit: config.unit,
        color: config.color,
        latest: last.map(|p| p.value),
        latest_date: last.map(|p| p.date),
        formatted: last
            .map(|p| format_value(p.value, config.unit))
            .unwrap_or_else(|| format_value(f64::NAN, config.unit)),
        change,
        trend: Trend::from_pct(change.pct),
    }
}

/// Cards for `ids` (in that order) over the dataset's window.
pub fn metric_cards<'a>(
    dataset: &Dataset,
    ids: impl IntoIterator<Item = &'a str>,
    basis: ChangeBasis,
) -> Vec<MetricCard> {
    ids.into_iter()
        .filter_map(|id| {
            let config = dataset.catalog().config(id)?;
            Some(metric_card(config, dataset.points(id), basis))
        })
        .collect()
}

/// Values of several series joined on date; `None` where a series has no point.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedRow {
    pub date: NaiveDate,
    pub values: Vec<Option<f64>>,
}

/// Join every series in catalog order, ascending by date.
pub fn join_by_date(dataset: &Dataset) -> (Vec<&SeriesConfig>, Vec<JoinedRow>) {
    let configs: Vec<&SeriesConfig> = dataset.catalog().configs().collect();
    let mut by_date: BTreeMap<NaiveDate, Vec<Option<f64>>> = BTreeMap::new();
    for (col, (_, points)) in dataset.iter().enumerate() {
        for p in points {
            by_date.entry(p.date).or_insert_with(|| vec![None; configs.len()])[col] = Some(p.value);
        }
    }
    let rows = by_date
        .into_iter()
        .map(|(date, values)| JoinedRow { date, values })
        .collect();
    (configs, rows)
}

pub const DATA_TABLE_MAX_ROWS: usize = 500;

/// The data tab: newest first, optionally filtered by a date substring, capped.
#[derive(Debug, Clone)]
pub struct DataTable<'a> {
    pub columns: Vec<&'a SeriesConfig>,
    pub rows: Vec<JoinedRow>,
    /// Rows that matched the filter before the cap was applied.
    pub matched: usize,
}

impl DataTable<'_> {
    /// Display text of one cell; `—` when the series has no value that day.
    pub fn cell_text(&self, row: usize, col: usize) -> String {
        let unit = self.columns.get(col).map(|c| c.unit).unwrap_or_default();
        let value = self
            .rows
            .get(row)
            .and_then(|r| r.values.get(col).copied().flatten())
            .unwrap_or(f64::NAN);
        format_value(value, unit)
    }
}

pub fn data_table<'a>(dataset: &'a Dataset, filter: Option<&str>, limit: usize) -> DataTable<'a> {
    let (columns, mut rows) = join_by_date(dataset);
    rows.reverse();
    if let Some(needle) = filter.map(str::trim).filter(|f| !f.is_empty()) {
        rows.retain(|r| r.date.to_string().contains(needle));
    }
    let matched = rows.len();
    rows.truncate(limit);
    DataTable {
        columns,
        rows,
        matched,
    }
}
