//! The series catalog and its range-filtered view.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;

use crate::domain::{Point, RangeWindow, SeriesConfig};
use crate::error::AppError;
use crate::report::window::window_start_index;

/// One built series: metadata plus its canonical point history.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub config: SeriesConfig,
    /// Strictly increasing by timestamp, one point per date.
    pub points: Vec<Point>,
    /// Rows whose date or value failed to coerce for this series.
    pub skipped: usize,
}

/// All series from one ingestion cycle, in column order.
///
/// Immutable once built; a fresh ingestion produces a new catalog.
#[derive(Debug, Clone, Default)]
pub struct SeriesCatalog {
    series: Vec<Series>,
    index: HashMap<String, usize>,
}

impl SeriesCatalog {
    pub fn new(series: Vec<Series>) -> Result<Self, AppError> {
        let mut index = HashMap::with_capacity(series.len());
        for (pos, s) in series.iter().enumerate() {
            if index.insert(s.config.id.clone(), pos).is_some() {
                return Err(AppError::format(format!(
                    "Duplicate series id '{}' in catalog.",
                    s.config.id
                )));
            }
        }
        Ok(Self { series, index })
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Series> {
        self.index.get(id).map(|&pos| &self.series[pos])
    }

    pub fn config(&self, id: &str) -> Option<&SeriesConfig> {
        self.get(id).map(|s| &s.config)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Series in catalog (column) order.
    pub fn iter(&self) -> impl Iterator<Item = &Series> {
        self.series.iter()
    }

    pub fn configs(&self) -> impl Iterator<Item = &SeriesConfig> {
        self.series.iter().map(|s| &s.config)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.series.iter().map(|s| s.config.id.as_str())
    }

    pub fn total_points(&self) -> usize {
        self.series.iter().map(|s| s.points.len()).sum()
    }
}

/// A catalog seen through one range window.
///
/// Cheap to clone: the catalog is shared and each series' window is a start
/// offset into its (sorted) point history.
#[derive(Debug, Clone)]
pub struct Dataset {
    catalog: Arc<SeriesCatalog>,
    range: RangeWindow,
    today: NaiveDate,
    starts: Vec<usize>,
}

impl Dataset {
    pub fn new(catalog: Arc<SeriesCatalog>, range: RangeWindow, today: NaiveDate) -> Self {
        let starts = catalog
            .iter()
            .map(|s| window_start_index(&s.points, range, today))
            .collect();
        Self {
            catalog,
            range,
            today,
            starts,
        }
    }

    /// Same catalog, different window.
    pub fn with_range(&self, range: RangeWindow) -> Self {
        Self::new(Arc::clone(&self.catalog), range, self.today)
    }

    pub fn catalog(&self) -> &SeriesCatalog {
        &self.catalog
    }

    pub fn shared_catalog(&self) -> Arc<SeriesCatalog> {
        Arc::clone(&self.catalog)
    }

    pub fn range(&self) -> RangeWindow {
        self.range
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// Range-filtered points of one series; empty for unknown ids.
    pub fn points(&self, id: &str) -> &[Point] {
        match self.catalog.position(id) {
            Some(pos) => self.window_at(pos),
            None => &[],
        }
    }

    fn window_at(&self, pos: usize) -> &[Point] {
        let points = &self.catalog.series[pos].points;
        &points[self.starts[pos].min(points.len())..]
    }

    /// `(config, windowed points)` in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = (&SeriesConfig, &[Point])> {
        self.catalog
            .series
            .iter()
            .enumerate()
            .map(|(pos, s)| (&s.config, self.window_at(pos)))
    }
}
