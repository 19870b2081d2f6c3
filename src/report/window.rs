//! Range filtering of a sorted point history.

use chrono::{NaiveDate, Utc};

use crate::domain::{Point, RangeWindow};

/// Today's calendar date (UTC), the anchor every window is resolved against.
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Index of the first point inside `window`.
///
/// `points` must be sorted ascending by timestamp (the builder guarantees it).
pub fn window_start_index(points: &[Point], window: RangeWindow, today: NaiveDate) -> usize {
    match window {
        RangeWindow::All => 0,
        _ => {
            let start = window.start_timestamp(today);
            points.partition_point(|p| p.timestamp < start)
        }
    }
}

/// Points with `timestamp >= window start`. `All` returns the full slice.
///
/// Borrows from `points`; the source is never modified.
pub fn filter_by_range(points: &[Point], window: RangeWindow, today: NaiveDate) -> &[Point] {
    &points[window_start_index(points, window, today)..]
}

pub fn filter_by_range_now(points: &[Point], window: RangeWindow) -> &[Point] {
    filter_by_range(points, window, today())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn daily(from: NaiveDate, days: i64) -> Vec<Point> {
        (0..days)
            .map(|i| Point::new(from + chrono::Duration::days(i), i as f64))
            .collect()
    }

    #[test]
    fn all_returns_the_whole_series() {
        let start = NaiveDate::from_ymd_opt(2022, 3, 1).unwrap();
        let points = daily(start, 731);
        let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();

        let all = filter_by_range(&points, RangeWindow::All, today);
        assert_eq!(all.len(), points.len());
        assert_eq!(all, points.as_slice());
    }

    #[test]
    fn one_month_keeps_only_the_trailing_calendar_month() {
        let start = NaiveDate::from_ymd_opt(2022, 3, 1).unwrap();
        // 2022-03-01 ..= 2024-03-01
        let points = daily(start, 732);
        let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();

        let month = filter_by_range(&points, RangeWindow::OneMonth, today);
        let first = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        assert_eq!(month.first().map(|p| p.date), Some(first));
        assert_eq!(month.len(), 30);
        assert!(month.iter().all(|p| p.date >= first));
    }

    #[test]
    fn window_past_the_history_is_empty() {
        let points = daily(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(), 10);
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert!(filter_by_range(&points, RangeWindow::OneYear, today).is_empty());
        assert!(filter_by_range(&[], RangeWindow::All, today).is_empty());
    }
}
