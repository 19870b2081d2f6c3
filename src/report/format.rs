//! Value formatting and plain-text terminal output.
//!
//! We keep formatting code in one place so:
//! - the tooltip, the cards, and the tables always agree on how a value reads
//! - output changes are localized (important for snapshot-style tests)

use num_format::Locale;

use crate::domain::{Dataset, Unit};
use crate::report::{DataTable, MetricCard};

/// Placeholder for a missing or non-finite value.
pub const MISSING: &str = "—";

/// Format a value for display according to its unit.
///
/// - `%`: two decimals plus `%`
/// - `M USD`: `$x.xxT` from a million millions, `$x.xB` from a thousand, else `$xM`
/// - `B USD`: `$x.xxT` from a thousand billions, else `$x.xB`
/// - `USD`: `$` plus a grouped integer
/// - no unit: grouped, up to four decimals
pub fn format_value(value: f64, unit: Unit) -> String {
    if !value.is_finite() {
        return MISSING.to_string();
    }
    let abs = value.abs();
    match unit {
        Unit::Percent => format!("{value:.2}%"),
        Unit::MillionsUsd if abs >= 1e6 => format!("${:.2}T", value / 1e6),
        Unit::MillionsUsd if abs >= 1e3 => format!("${:.1}B", value / 1e3),
        Unit::MillionsUsd => format!("${value:.0}M"),
        Unit::BillionsUsd if abs >= 1e3 => format!("${:.2}T", value / 1e3),
        Unit::BillionsUsd => format!("${value:.1}B"),
        Unit::Usd => format!("${}", grouped_integer(value)),
        Unit::None => grouped_decimal(value, 4),
    }
}

/// Axis-tick label: `format_value` with at most two decimals for unitless numbers.
pub fn format_axis_value(value: f64, unit: Unit) -> String {
    match unit {
        Unit::None => grouped_decimal(value, 2),
        _ => format_value(value, unit),
    }
}

/// Signed change text, e.g. `+5.00 (+5.00%)`.
pub fn format_change(value: f64, pct: f64) -> String {
    format!("{value:+.2} ({pct:+.2}%)")
}

fn grouped_integer(value: f64) -> String {
    let digits = format!("{:.0}", value.abs());
    let sign = if value < 0.0 && digits != "0" { "-" } else { "" };
    format!("{sign}{}", group_digits(&digits))
}

fn grouped_decimal(value: f64, max_decimals: usize) -> String {
    let fixed = format!("{:.*}", max_decimals, value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));
    let frac = frac_part.trim_end_matches('0');

    let mut out = String::new();
    if value < 0.0 && (int_part != "0" || !frac.is_empty()) {
        out.push('-');
    }
    out.push_str(&group_digits(int_part));
    if !frac.is_empty() {
        out.push('.');
        out.push_str(frac);
    }
    out
}

/// Insert the locale's thousands separator into a run of ASCII digits.
///
/// Works on the digit string itself so magnitudes beyond `i64` keep every digit.
fn group_digits(digits: &str) -> String {
    let separator = Locale::en.separator();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 * separator.len());
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push_str(separator);
        }
        out.push(c);
    }
    out
}

/// Header block plus one row per card.
pub fn format_summary(dataset: &Dataset, cards: &[MetricCard]) -> String {
    let mut out = String::new();

    out.push_str("=== liq - Liquidity Monitor ===\n");
    out.push_str(&format!(
        "Range: {} (as of {})\n",
        dataset.range().label(),
        dataset.today()
    ));
    out.push_str(&format!(
        "Series: n={} | points={}\n\n",
        dataset.catalog().len(),
        dataset.catalog().total_points()
    ));

    out.push_str(
        format!(
            "{:<18} {:<20} {:>14} {:<10} {:>24} {:<5}\n",
            "id", "label", "latest", "date", "change", "trend"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(
        format!(
            "{:-<18} {:-<20} {:-<14} {:-<10} {:-<24} {:-<5}\n",
            "", "", "", "", "", ""
        )
        .trim_end(),
    );
    out.push('\n');

    for card in cards {
        out.push_str(
            format!(
                "{:<18} {:<20} {:>14} {:<10} {:>24} {:<5}\n",
                truncate(&card.id, 18),
                truncate(&card.label, 20),
                card.formatted,
                card.latest_date.map(|d| d.to_string()).unwrap_or_else(|| MISSING.to_string()),
                format_change(card.change.value, card.change.pct),
                card.trend.symbol(),
            )
            .trim_end(),
        );
        out.push('\n');
    }

    out
}

/// The date-joined table, one line per date.
pub fn format_data_table(table: &DataTable<'_>) -> String {
    const COL: usize = 14;
    let mut out = String::new();

    let mut header = format!("{:<10}", "Date");
    for c in &table.columns {
        header.push_str(&format!(" {:>width$}", truncate(&c.short_label, COL), width = COL));
    }
    out.push_str(header.trim_end());
    out.push('\n');

    for (r, row) in table.rows.iter().enumerate() {
        let mut line = format!("{:<10}", row.date);
        for c in 0..table.columns.len() {
            line.push_str(&format!(" {:>width$}", table.cell_text(r, c), width = COL));
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }

    if table.matched > table.rows.len() {
        out.push_str(&format!(
            "({} of {} rows shown)\n",
            table.rows.len(),
            table.matched
        ));
    }
    out
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn millions_scale_to_trillions_and_billions() {
        assert_eq!(format_value(2_500_000.0, Unit::MillionsUsd), "$2.50T");
        assert_eq!(format_value(3_456.0, Unit::MillionsUsd), "$3.5B");
        assert_eq!(format_value(850.0, Unit::MillionsUsd), "$850M");
        assert_eq!(format_value(-1_200_000.0, Unit::MillionsUsd), "$-1.20T");
    }

    #[test]
    fn billions_scale_to_trillions() {
        assert_eq!(format_value(1_500.0, Unit::BillionsUsd), "$1.50T");
        assert_eq!(format_value(950.26, Unit::BillionsUsd), "$950.3B");
    }

    #[test]
    fn percent_and_currency() {
        assert_eq!(format_value(4.2, Unit::Percent), "4.20%");
        assert_eq!(format_value(64_321.7, Unit::Usd), "$64,322");
    }

    #[test]
    fn unitless_values_are_grouped_with_trimmed_decimals() {
        assert_eq!(format_value(1_234_567.891_26, Unit::None), "1,234,567.8913");
        assert_eq!(format_value(12.5, Unit::None), "12.5");
        assert_eq!(format_value(-3.0, Unit::None), "-3");
        assert_eq!(format_value(-0.000_01, Unit::None), "0");
    }

    #[test]
    fn magnitudes_beyond_i64_keep_every_digit() {
        assert_eq!(format_value(1e20, Unit::None), "100,000,000,000,000,000,000");
        assert_eq!(format_value(1.5e19, Unit::None), "15,000,000,000,000,000,000");
        assert_eq!(format_value(1e20, Unit::Usd), "$100,000,000,000,000,000,000");
        assert_eq!(format_value(-1e20, Unit::Usd), "$-100,000,000,000,000,000,000");
        assert_eq!(format_axis_value(-2.5e19, Unit::None), "-25,000,000,000,000,000,000");
    }

    #[test]
    fn non_finite_values_render_as_missing() {
        assert_eq!(format_value(f64::NAN, Unit::Percent), MISSING);
        assert_eq!(format_value(f64::INFINITY, Unit::Usd), MISSING);
    }

    #[test]
    fn change_text_is_signed() {
        assert_eq!(format_change(5.0, 5.0), "+5.00 (+5.00%)");
        assert_eq!(format_change(-0.5, -1.25), "-0.50 (-1.25%)");
    }

    #[test]
    fn truncate_marks_cut_text() {
        assert_eq!(truncate("WRESBAL", 10), "WRESBAL");
        assert_eq!(truncate("TOTAL_IMPLIED_LIQ", 8), "TOTAL_I.");
    }
}
