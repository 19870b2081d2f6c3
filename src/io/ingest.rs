//! Series builder: parsed table + resolved metadata → series catalog.
//!
//! Design goals:
//! - **Row-level tolerance** (a bad cell drops that row from one series only)
//! - **Deterministic output** (same payload, same ids, colors, and points)
//! - **Canonical histories** (sorted ascending, one point per date, first wins)

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::domain::{Point, ResolverKind, Series, SeriesCatalog, SeriesConfig, SourceFormat};
use crate::error::AppError;
use crate::io::coerce::{parse_date, parse_number};
use crate::io::table::{Table, parse_payload};
use crate::meta::{
    ColumnProfile, ExplicitMapping, IdAllocator, MetadataResolver, Palette, derive_id, detect_date_column,
    select_resolver,
};

/// Parse a raw payload and build its catalog in one step.
pub fn ingest_payload(
    text: &str,
    format: SourceFormat,
    resolver: ResolverKind,
    mapping: &ExplicitMapping,
) -> Result<SeriesCatalog, AppError> {
    let (table, kind) = parse_payload(text, format)?;
    let resolver = select_resolver(resolver, kind, mapping);
    debug!(
        payload = ?kind,
        resolver = resolver.name(),
        columns = table.headers.len(),
        rows = table.rows.len(),
        "parsed payload"
    );

    let catalog = build_catalog(&table, resolver.as_ref())?;
    info!(
        series = catalog.len(),
        points = catalog.total_points(),
        "built series catalog"
    );
    Ok(catalog)
}

/// One series per non-date column, in column order.
pub fn build_catalog(table: &Table, resolver: &dyn MetadataResolver) -> Result<SeriesCatalog, AppError> {
    let date_col = detect_date_column(table)
        .ok_or_else(|| AppError::format("Payload has no columns."))?;
    if table.headers.len() < 2 {
        return Err(AppError::format(format!(
            "Payload has only a date column ('{}'), no series.",
            table.headers[date_col]
        )));
    }
    debug!(column = %table.headers[date_col], "date column");

    let dates: Vec<Option<NaiveDate>> = table.column(date_col).map(parse_date).collect();

    let mut ids = IdAllocator::default();
    let mut palette = Palette::default();
    let mut series = Vec::with_capacity(table.headers.len() - 1);

    let value_cols = table
        .headers
        .iter()
        .enumerate()
        .filter(|&(col, _)| col != date_col);

    for (position, (col, name)) in value_cols.enumerate() {
        let values: Vec<Option<f64>> = table.column(col).map(parse_number).collect();
        let numeric: Vec<f64> = values.iter().flatten().copied().collect();

        let meta = resolver.resolve(&ColumnProfile {
            name,
            position,
            values: &numeric,
        });
        let base_id = meta.id.clone().unwrap_or_else(|| derive_id(name));
        let id = ids.allocate(&base_id, position);
        let color = palette.assign(meta.color, position);
        let label = if meta.label.is_empty() { id.clone() } else { meta.label };

        let (points, skipped) = build_points(&dates, &values);
        if skipped > 0 {
            debug!(series = %id, skipped, kept = points.len(), "skipped rows");
        }

        series.push(Series {
            config: SeriesConfig::new(id, label, meta.unit, color),
            points,
            skipped,
        });
    }

    SeriesCatalog::new(series)
}

/// Zip dates with values, drop rows where either failed, sort, dedup.
///
/// Returns the canonical points and the number of rows that did not survive
/// coercion. Same-date duplicates keep the first row in input order.
pub fn build_points(dates: &[Option<NaiveDate>], values: &[Option<f64>]) -> (Vec<Point>, usize) {
    let mut points: Vec<Point> = dates
        .iter()
        .zip(values)
        .filter_map(|(d, v)| Some(Point::new((*d)?, (*v)?)))
        .collect();
    let skipped = dates.len().max(values.len()) - points.len();

    // Stable sort keeps input order among equal timestamps; dedup keeps the first.
    points.sort_by_key(|p| p.timestamp);
    points.dedup_by_key(|p| p.timestamp);

    (points, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Axis, Category, RenderType, Unit};
    use crate::meta::{ExplicitFirst, HeuristicOnly, PALETTE};

    fn d(y: i32, m: u32, day: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, day)
    }

    #[test]
    fn points_are_sorted_and_first_duplicate_wins() {
        let dates = [d(2024, 1, 3), d(2024, 1, 1), d(2024, 1, 3), None, d(2024, 1, 2)];
        let values = [Some(3.0), Some(1.0), Some(99.0), Some(5.0), None];
        let (points, skipped) = build_points(&dates, &values);

        let got: Vec<(NaiveDate, f64)> = points.iter().map(|p| (p.date, p.value)).collect();
        assert_eq!(
            got,
            vec![(d(2024, 1, 1).unwrap(), 1.0), (d(2024, 1, 3).unwrap(), 3.0)]
        );
        assert_eq!(skipped, 2);
        assert!(points.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn delimited_payload_builds_heuristic_series() {
        let csv = "date,WRESBAL,10y yield\n2024-01-02,105,4.1\n2024-01-01,100,n/a\n2024-01-01,777,4.0\n";
        let catalog = ingest_payload(csv, SourceFormat::Auto, ResolverKind::Auto, &ExplicitMapping::builtin()).unwrap();

        assert_eq!(catalog.ids().collect::<Vec<_>>(), vec!["WRESBAL", "10Y_YIELD"]);

        let wresbal = catalog.get("WRESBAL").unwrap();
        assert_eq!(wresbal.points.iter().map(|p| p.value).collect::<Vec<_>>(), vec![100.0, 105.0]);
        assert_eq!(wresbal.config.unit, Unit::Usd);
        assert_eq!(wresbal.config.color, PALETTE[0]);

        let yield_ = catalog.get("10Y_YIELD").unwrap();
        assert_eq!(yield_.config.unit, Unit::Percent);
        assert_eq!(yield_.config.render, RenderType::Line);
        assert_eq!(yield_.config.axis, Axis::Right);
        assert_eq!(yield_.config.category, Category::Rates);
        assert_eq!(yield_.points.len(), 2);
        assert_eq!(yield_.skipped, 1);
    }

    #[test]
    fn json_payload_uses_explicit_mapping() {
        let json = r#"[
            {"data": "2024-01-01", "wresbal_oficjalny": 3200000, "btc_usd": "42,000", "mystery": 1.5},
            {"data": "2024-01-02", "wresbal_oficjalny": 3250000, "btc_usd": 43000, "mystery": null}
        ]"#;
        let catalog =
            ingest_payload(json, SourceFormat::Auto, ResolverKind::Auto, &ExplicitMapping::builtin()).unwrap();

        assert_eq!(
            catalog.ids().collect::<Vec<_>>(),
            vec!["WRESBAL_MLN_USD", "BITCOIN", "MYSTERY"]
        );
        let btc = catalog.config("BITCOIN").unwrap();
        assert_eq!(btc.label, "Bitcoin");
        assert_eq!(btc.unit, Unit::Usd);
        assert_eq!(catalog.get("BITCOIN").unwrap().points[0].value, 42_000.0);
        assert_eq!(catalog.get("MYSTERY").unwrap().points.len(), 1);
    }

    #[test]
    fn colliding_ids_get_suffixes() {
        let table = Table {
            headers: vec!["date".into(), "a b".into(), "A_B".into()],
            rows: vec![vec!["2024-01-01".into(), "1".into(), "2".into()]],
        };
        let catalog = build_catalog(&table, &HeuristicOnly).unwrap();
        assert_eq!(catalog.ids().collect::<Vec<_>>(), vec!["A_B", "A_B_2"]);
    }

    #[test]
    fn reingesting_is_deterministic() {
        let csv = "day,x,y\n1/2/2024,1,2\n2/2/2024,3,4\n";
        let resolver = ExplicitFirst::new(ExplicitMapping::default());
        let (table, _) = parse_payload(csv, SourceFormat::Csv).unwrap();
        let a = build_catalog(&table, &resolver).unwrap();
        let b = build_catalog(&table, &resolver).unwrap();
        assert_eq!(a.iter().collect::<Vec<_>>(), b.iter().collect::<Vec<_>>());
    }

    #[test]
    fn date_only_payload_is_a_format_error() {
        let table = Table {
            headers: vec!["date".into()],
            rows: vec![vec!["2024-01-01".into()]],
        };
        assert!(build_catalog(&table, &HeuristicOnly).is_err());
    }
}
