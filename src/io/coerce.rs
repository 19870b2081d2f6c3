//! Cell coercion: raw text → numbers and calendar dates.
//!
//! Both functions return `None` instead of failing. Callers treat `None` as
//! "this row does not contribute to the series", never as zero.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

/// Cell contents that mean "no observation".
const MISSING_SENTINELS: [&str; 11] = [
    "", "-", "—", "–", ".", "n/a", "na", "nan", "null", "none", "#n/a",
];

/// Native (ISO-family) date layouts, tried in order.
const DATE_FMTS: [&str; 5] = ["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d", "%b %d, %Y", "%B %d, %Y"];

const DATETIME_FMTS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse a numeric cell, tolerating currency symbols, percent signs,
/// grouping whitespace, and thousands-separator commas.
///
/// A single comma followed by one or two digits (`"12,34"`) is a decimal mark;
/// every other comma is a thousands separator and is dropped.
pub fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if is_missing(trimmed) {
        return None;
    }

    let cleaned: String = trimmed
        .chars()
        .filter(|c| !matches!(c, '$' | '€' | '£' | '¥' | '%') && !c.is_whitespace())
        .collect();
    if is_missing(&cleaned) {
        return None;
    }

    let normalized = if is_decimal_comma(&cleaned) {
        cleaned.replacen(',', ".", 1)
    } else {
        cleaned.replace(',', "")
    };

    let v = normalized.parse::<f64>().ok()?;
    v.is_finite().then_some(v)
}

/// Parse a date cell.
///
/// ISO-family layouts (with or without a time of day, RFC 3339, RFC 2822) are
/// tried first. Then numeric dates with a four-digit year at the end:
/// slashed dates read month-first (`2/1/2024` is 1 February) unless the first
/// field cannot be a month; `-` and `.` separated dates read day-first
/// (`31-12-2023`, `2.1.2024` is 2 January). Any time-of-day component is
/// discarded.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    parse_native_date(s).or_else(|| {
        numeric_candidates(s)?
            .into_iter()
            .find_map(|iso| parse_native_date(&iso))
    })
}

/// UTC midnight of `date` in seconds since the epoch.
pub fn date_timestamp(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp()
}

/// Calendar date (UTC) of an epoch-seconds timestamp.
pub fn timestamp_date(timestamp: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(timestamp, 0).map(|dt| dt.date_naive())
}

fn is_missing(s: &str) -> bool {
    MISSING_SENTINELS.iter().any(|m| s.eq_ignore_ascii_case(m))
}

fn is_decimal_comma(s: &str) -> bool {
    let body = s.strip_prefix('-').unwrap_or(s);
    let Some((int, frac)) = body.split_once(',') else {
        return false;
    };
    !int.is_empty()
        && int.bytes().all(|b| b.is_ascii_digit())
        && (1..=2).contains(&frac.len())
        && frac.bytes().all(|b| b.is_ascii_digit())
}

fn parse_native_date(s: &str) -> Option<NaiveDate> {
    for fmt in DATE_FMTS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    for fmt in DATETIME_FMTS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.date_naive());
    }
    None
}

/// ISO rewrites of a `A?B?YYYY` date, most likely reading first.
fn numeric_candidates(s: &str) -> Option<Vec<String>> {
    let slashed = s.contains('/');
    let parts: Vec<&str> = s.split(['/', '-', '.']).collect();
    let [first, second, year] = parts.as_slice() else {
        return None;
    };
    let digits = |p: &str, min: usize, max: usize| {
        (min..=max).contains(&p.len()) && p.bytes().all(|b| b.is_ascii_digit())
    };
    if !(digits(first, 1, 2) && digits(second, 1, 2) && digits(year, 4, 4)) {
        return None;
    }
    let iso = |month: &str, day: &str| format!("{year}-{month:0>2}-{day:0>2}");
    Some(if slashed {
        vec![iso(first, second), iso(second, first)]
    } else {
        vec![iso(second, first)]
    })
}
