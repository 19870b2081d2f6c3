//! Chart surfaces as pure projections.
//!
//! Every surface (overview, builder, overlay, popup, per-series minis) is
//! redrawn from a fresh [`ChartSpec`] built from the current dataset and
//! builder state. Nothing is patched incrementally, so two surfaces reading
//! the same state always agree.

pub mod registry;

use chrono::NaiveDate;

use crate::builder::BuilderState;
use crate::domain::{Axis, Dataset, Point, RenderType, Rgb, SeriesCatalog, SeriesConfig, Unit};
use crate::io::coerce::timestamp_date;
use crate::report::format::format_value;

/// Which on-screen surface a projection or handle belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SurfaceKind {
    Overview,
    Builder,
    /// Maximised builder chart, or one series expanded.
    Overlay,
    /// An expanded miniature.
    Popup,
    Mini(String),
}

impl SurfaceKind {
    pub fn is_mini(&self) -> bool {
        matches!(self, SurfaceKind::Mini(_))
    }
}

/// One drawable series: presentation plus borrowed, already windowed points.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesSpec<'a> {
    pub id: &'a str,
    pub label: &'a str,
    pub short_label: &'a str,
    pub unit: Unit,
    pub color: Rgb,
    pub render: RenderType,
    pub axis: Axis,
    pub points: &'a [Point],
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AxisSpec {
    pub visible: bool,
    pub inverted: bool,
    /// Unit of the first series scaled against this axis, for tick labels.
    pub unit: Option<Unit>,
}

/// Everything a chart widget needs to draw one surface.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSpec<'a> {
    pub kind: SurfaceKind,
    pub title: String,
    pub series: Vec<SeriesSpec<'a>>,
    pub left: AxisSpec,
    pub right: AxisSpec,
    /// Miniature styling: no axes, no grid, no legend.
    pub compact: bool,
}

impl<'a> ChartSpec<'a> {
    fn new(kind: SurfaceKind, title: impl Into<String>) -> Self {
        let compact = kind.is_mini();
        Self {
            kind,
            title: title.into(),
            series: Vec::new(),
            left: AxisSpec::default(),
            right: AxisSpec {
                visible: !compact,
                ..AxisSpec::default()
            },
            compact,
        }
    }

    /// Add a series unless it has no points in the window.
    ///
    /// Binding a series to the left axis makes that axis visible. Each added
    /// series sets its axis' inversion, so the last one on an axis decides.
    fn push(
        &mut self,
        config: &'a SeriesConfig,
        points: &'a [Point],
        render: RenderType,
        axis: Axis,
        color: Rgb,
        inverted: bool,
    ) {
        if points.is_empty() {
            return;
        }
        let compact = self.compact;
        let spec = match axis {
            Axis::Left => &mut self.left,
            Axis::Right => &mut self.right,
        };
        spec.visible = !compact;
        spec.inverted = inverted;
        if spec.unit.is_none() {
            spec.unit = Some(config.unit);
        }

        self.series.push(SeriesSpec {
            id: &config.id,
            label: &config.label,
            short_label: &config.short_label,
            unit: config.unit,
            color,
            render,
            axis,
            points,
        });
    }

    pub fn axis(&self, axis: Axis) -> &AxisSpec {
        match axis {
            Axis::Left => &self.left,
            Axis::Right => &self.right,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Earliest and latest timestamp across all series.
    pub fn time_bounds(&self) -> Option<(i64, i64)> {
        let first = self.series.iter().filter_map(|s| s.points.first()).map(|p| p.timestamp).min()?;
        let last = self.series.iter().filter_map(|s| s.points.last()).map(|p| p.timestamp).max()?;
        Some((first, last))
    }

    /// Value range of the series on `axis`.
    pub fn value_bounds(&self, axis: Axis) -> Option<(f64, f64)> {
        let mut values = self
            .series
            .iter()
            .filter(|s| s.axis == axis)
            .flat_map(|s| s.points.iter().map(|p| p.value));
        let first = values.next()?;
        Some(values.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
    }
}

/// The builder chart: one series per binding, in binding order.
pub fn project_builder<'a>(state: &BuilderState, dataset: &'a Dataset) -> ChartSpec<'a> {
    project_bindings(SurfaceKind::Builder, "Chart Builder", state, dataset)
}

/// The maximised builder chart.
pub fn project_overlay<'a>(state: &BuilderState, dataset: &'a Dataset) -> ChartSpec<'a> {
    project_bindings(SurfaceKind::Overlay, "Chart Builder", state, dataset)
}

fn project_bindings<'a>(
    kind: SurfaceKind,
    title: &str,
    state: &BuilderState,
    dataset: &'a Dataset,
) -> ChartSpec<'a> {
    let mut spec = ChartSpec::new(kind, title);
    for b in state.bindings() {
        let Some(config) = dataset.catalog().config(&b.series_id) else {
            continue;
        };
        spec.push(config, dataset.points(&b.series_id), b.render, b.axis, b.color, b.invert_axis);
    }
    spec
}

/// The two series the overview compares.
///
/// The series labelled "total implied" and the one labelled "bitcoin", topped
/// up from the start of the catalog when either is missing.
pub fn overview_series(catalog: &SeriesCatalog) -> Vec<&SeriesConfig> {
    let find = |needle: &str| catalog.configs().find(|c| c.label.to_lowercase().contains(needle));
    let mut picked: Vec<&SeriesConfig> = [find("total implied"), find("bitcoin")]
        .into_iter()
        .flatten()
        .collect();
    picked.dedup_by(|a, b| a.id == b.id);
    if picked.len() < 2 {
        let missing = 2 - picked.len();
        let fill: Vec<&SeriesConfig> = catalog
            .configs()
            .filter(|c| !picked.iter().any(|p| p.id == c.id))
            .take(missing)
            .collect();
        picked.extend(fill);
    }
    picked
}

/// The overview: first series on the right axis, second on the left, both
/// drawn with the overview's global type.
pub fn project_overview(dataset: &Dataset, render: RenderType) -> ChartSpec<'_> {
    let picked = overview_series(dataset.catalog());
    let title = picked.iter().map(|c| c.label.as_str()).collect::<Vec<_>>().join(" vs ");
    let mut spec = ChartSpec::new(SurfaceKind::Overview, title);
    for (config, axis) in picked.into_iter().zip([Axis::Right, Axis::Left]) {
        spec.push(config, dataset.points(&config.id), render, axis, config.color, false);
    }
    spec
}

/// A dashboard miniature of one series.
pub fn project_mini<'a>(dataset: &'a Dataset, id: &str, render: RenderType) -> Option<ChartSpec<'a>> {
    single(dataset, SurfaceKind::Mini(id.to_string()), id, render)
}

/// An expanded miniature.
pub fn project_popup<'a>(dataset: &'a Dataset, id: &str, render: RenderType) -> Option<ChartSpec<'a>> {
    single(dataset, SurfaceKind::Popup, id, render)
}

/// One series expanded into the overlay, drawn as an area.
pub fn project_single_overlay<'a>(dataset: &'a Dataset, id: &str) -> Option<ChartSpec<'a>> {
    single(dataset, SurfaceKind::Overlay, id, RenderType::Area)
}

fn single<'a>(dataset: &'a Dataset, kind: SurfaceKind, id: &str, render: RenderType) -> Option<ChartSpec<'a>> {
    let config = dataset.catalog().config(id)?;
    let mut spec = ChartSpec::new(kind, config.label.clone());
    spec.push(config, dataset.points(id), render, Axis::Right, config.color, false);
    Some(spec)
}

/// One line of a crosshair tooltip.
#[derive(Debug, Clone, PartialEq)]
pub struct TooltipEntry {
    pub id: String,
    pub label: String,
    pub color: Rgb,
    pub date: NaiveDate,
    pub value: f64,
    pub formatted: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tooltip {
    /// The crosshair position as a calendar date.
    pub date: Option<NaiveDate>,
    pub entries: Vec<TooltipEntry>,
}

/// Resolve a crosshair timestamp to the nearest observation of every series.
///
/// Exact matches win; otherwise the closer neighbour, with ties going to the
/// earlier point. Series without points contribute nothing.
pub fn tooltip_at(spec: &ChartSpec<'_>, timestamp: i64) -> Tooltip {
    let entries = spec
        .series
        .iter()
        .filter_map(|s| {
            let p = nearest_point(s.points, timestamp)?;
            Some(TooltipEntry {
                id: s.id.to_string(),
                label: s.short_label.to_string(),
                color: s.color,
                date: p.date,
                value: p.value,
                formatted: format_value(p.value, s.unit),
            })
        })
        .collect();
    Tooltip {
        date: timestamp_date(timestamp),
        entries,
    }
}

pub fn nearest_point(points: &[Point], timestamp: i64) -> Option<&Point> {
    let idx = points.partition_point(|p| p.timestamp < timestamp);
    let after = points.get(idx);
    let before = idx.checked_sub(1).and_then(|i| points.get(i));
    match (before, after) {
        (Some(b), Some(a)) => {
            if a.timestamp - timestamp < timestamp - b.timestamp {
                Some(a)
            } else {
                Some(b)
            }
        }
        (b, a) => b.or(a),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::builder::BindingEdit;
    use crate::domain::{RangeWindow, Series};
    use crate::io::coerce::date_timestamp;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn series(id: &str, label: &str, unit: Unit, days: &[(u32, f64)]) -> Series {
        Series {
            config: SeriesConfig::new(id, label, unit, Rgb(1, 2, 3)),
            points: days.iter().map(|&(d, v)| Point::new(date(d), v)).collect(),
            skipped: 0,
        }
    }

    fn dataset() -> Dataset {
        let catalog = SeriesCatalog::new(vec![
            series("TGA", "TGA", Unit::MillionsUsd, &[(1, 700_000.0), (5, 710_000.0)]),
            series("TOTAL", "Total Implied Liq", Unit::MillionsUsd, &[(1, 5_000_000.0), (3, 5_100_000.0)]),
            series("BTC", "Bitcoin", Unit::Usd, &[(2, 42_000.0), (4, 43_000.0)]),
            series("EMPTY", "Nothing", Unit::Percent, &[]),
        ])
        .unwrap();
        Dataset::new(Arc::new(catalog), RangeWindow::All, date(10))
    }

    #[test]
    fn overview_pairs_total_implied_with_bitcoin() {
        let data = dataset();
        let spec = project_overview(&data, RenderType::Bar);
        assert_eq!(spec.title, "Total Implied Liq vs Bitcoin");
        assert_eq!(spec.series[0].id, "TOTAL");
        assert_eq!(spec.series[0].axis, Axis::Right);
        assert_eq!(spec.series[1].id, "BTC");
        assert_eq!(spec.series[1].axis, Axis::Left);
        assert!(spec.series.iter().all(|s| s.render == RenderType::Bar));
        assert!(spec.left.visible && spec.right.visible);
    }

    #[test]
    fn overview_tops_up_from_the_catalog() {
        let catalog = SeriesCatalog::new(vec![
            series("A", "Alpha", Unit::Percent, &[(1, 1.0)]),
            series("B", "Bitcoin", Unit::Usd, &[(1, 1.0)]),
        ])
        .unwrap();
        let ids: Vec<&str> = overview_series(&catalog).iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["B", "A"]);
    }

    #[test]
    fn builder_projection_follows_bindings_and_axis_rules() {
        let data = dataset();
        let mut state = BuilderState::new();
        let _ = state.add(data.catalog().config("TGA").unwrap(), Axis::Right);
        let _ = state.add(data.catalog().config("EMPTY").unwrap(), Axis::Left);
        let _ = state.add(data.catalog().config("BTC").unwrap(), Axis::Right);

        let spec = project_builder(&state, &data);
        assert_eq!(spec.series.len(), 2);
        assert!(!spec.left.visible);
        assert!(spec.right.visible);
        assert_eq!(spec.right.unit, Some(Unit::MillionsUsd));

        let _ = state.reconfigure(2, BindingEdit::Axis(Axis::Left));
        let _ = state.reconfigure(2, BindingEdit::InvertAxis(true));
        let spec = project_builder(&state, &data);
        assert!(spec.left.visible && spec.left.inverted);
        assert!(!spec.right.inverted);

        let overlay = project_overlay(&state, &data);
        assert_eq!(overlay.series, spec.series);
        assert_eq!(overlay.kind, SurfaceKind::Overlay);
    }

    #[test]
    fn single_series_surfaces() {
        let data = dataset();
        let mini = project_mini(&data, "TGA", RenderType::Area).unwrap();
        assert!(mini.compact);
        assert!(!mini.right.visible);
        assert_eq!(mini.kind, SurfaceKind::Mini("TGA".into()));

        let popup = project_popup(&data, "TGA", RenderType::Bar).unwrap();
        assert!(popup.right.visible);
        assert_eq!(popup.series[0].render, RenderType::Bar);

        let single = project_single_overlay(&data, "BTC").unwrap();
        assert_eq!(single.series[0].render, RenderType::Area);
        assert!(project_mini(&data, "NOPE", RenderType::Area).is_none());
        assert!(project_mini(&data, "EMPTY", RenderType::Area).unwrap().is_empty());
    }

    #[test]
    fn bounds_span_all_series() {
        let data = dataset();
        let spec = project_overview(&data, RenderType::Line);
        assert_eq!(
            spec.time_bounds(),
            Some((date_timestamp(date(1)), date_timestamp(date(4))))
        );
        assert_eq!(spec.value_bounds(Axis::Left), Some((42_000.0, 43_000.0)));
    }

    #[test]
    fn tooltip_picks_nearest_point_per_series() {
        let data = dataset();
        let spec = project_overview(&data, RenderType::Line);
        let tip = tooltip_at(&spec, date_timestamp(date(2)));

        assert_eq!(tip.date, Some(date(2)));
        assert_eq!(tip.entries.len(), 2);
        // TOTAL has 1st and 3rd: equidistant, earlier wins.
        assert_eq!(tip.entries[0].date, date(1));
        assert_eq!(tip.entries[0].formatted, "$5.00T");
        assert_eq!(tip.entries[1].date, date(2));
        assert_eq!(tip.entries[1].formatted, "$42,000");
    }

    #[test]
    fn nearest_point_edges() {
        let points: Vec<Point> = [1, 4].iter().map(|&d| Point::new(date(d), d as f64)).collect();
        let ts = |d| date_timestamp(date(d));
        assert_eq!(nearest_point(&points, ts(1) - 1).map(|p| p.value), Some(1.0));
        assert_eq!(nearest_point(&points, ts(3)).map(|p| p.value), Some(4.0));
        assert_eq!(nearest_point(&points, ts(9)).map(|p| p.value), Some(4.0));
        assert!(nearest_point(&[], 0).is_none());
    }
}
