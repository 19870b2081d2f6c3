//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory by the builder and the chart surfaces
//! - exported to JSON/CSV
//! - handed to a rendering collaborator as-is

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::{Months, NaiveDate};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Display unit of a series.
///
/// The serialized form is the short label used by the feed and the cards
/// (`"%"`, `"M USD"`, ...). An empty label means the unit could not be determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Unit {
    #[serde(rename = "%")]
    Percent,
    #[serde(rename = "M USD")]
    MillionsUsd,
    #[serde(rename = "B USD")]
    BillionsUsd,
    #[serde(rename = "USD")]
    Usd,
    #[default]
    #[serde(rename = "")]
    None,
}

impl Unit {
    pub fn label(self) -> &'static str {
        match self {
            Unit::Percent => "%",
            Unit::MillionsUsd => "M USD",
            Unit::BillionsUsd => "B USD",
            Unit::Usd => "USD",
            Unit::None => "",
        }
    }

    /// Parse a unit label. An empty label is `Unit::None`; unknown labels are `None`.
    pub fn from_label(label: &str) -> Option<Self> {
        Some(match label.trim().to_ascii_uppercase().as_str() {
            "%" | "PCT" | "PERCENT" => Unit::Percent,
            "M USD" | "MLN USD" | "USD M" => Unit::MillionsUsd,
            "B USD" | "BLN USD" | "USD B" => Unit::BillionsUsd,
            "USD" | "$" => Unit::Usd,
            "" => Unit::None,
            _ => return None,
        })
    }

    pub fn is_percent(self) -> bool {
        self == Unit::Percent
    }
}

/// Coarse grouping derived from the unit: rate-like vs liquidity-like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    Rates,
    Liquidity,
}

impl Category {
    pub fn for_unit(unit: Unit) -> Self {
        if unit.is_percent() {
            Category::Rates
        } else {
            Category::Liquidity
        }
    }
}

/// How a bound series is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RenderType {
    #[default]
    Line,
    Area,
    Bar,
}

impl RenderType {
    pub const ALL: [RenderType; 3] = [RenderType::Line, RenderType::Area, RenderType::Bar];

    pub fn display_name(self) -> &'static str {
        match self {
            RenderType::Line => "line",
            RenderType::Area => "area",
            RenderType::Bar => "bar",
        }
    }

    pub fn next(self) -> Self {
        match self {
            RenderType::Line => RenderType::Area,
            RenderType::Area => RenderType::Bar,
            RenderType::Bar => RenderType::Line,
        }
    }
}

/// Which price axis a series is scaled against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    Left,
    Right,
}

impl Axis {
    pub fn display_name(self) -> &'static str {
        match self {
            Axis::Left => "LEFT",
            Axis::Right => "RIGHT",
        }
    }

    pub fn toggle(self) -> Self {
        match self {
            Axis::Left => Axis::Right,
            Axis::Right => Axis::Left,
        }
    }
}

/// An opaque display color, serialized as `#rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// Parse `#rrggbb` (the leading `#` is optional).
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        Some(Rgb(r, g, b))
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

impl std::fmt::Display for Rgb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl TryFrom<String> for Rgb {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Rgb::from_hex(&value).ok_or_else(|| format!("invalid color '{value}', expected #rrggbb"))
    }
}

impl From<Rgb> for String {
    fn from(value: Rgb) -> Self {
        value.to_hex()
    }
}

/// One observation of a series.
///
/// `timestamp` is the UTC midnight of `date` in seconds since the epoch; the two
/// fields are redundant by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub timestamp: i64,
    pub value: f64,
    #[serde(rename = "dateLabel")]
    pub date: NaiveDate,
}

impl Point {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self {
            timestamp: crate::io::coerce::date_timestamp(date),
            value,
            date,
        }
    }
}

/// Labels longer than this many characters get shortened for compact displays.
pub const SHORT_LABEL_MAX: usize = 14;

/// Identity and presentation metadata of one indicator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesConfig {
    pub id: String,
    pub label: String,
    pub short_label: String,
    pub unit: Unit,
    pub color: Rgb,
    #[serde(rename = "type")]
    pub render: RenderType,
    pub axis: Axis,
    pub description: String,
    pub category: Category,
}

impl SeriesConfig {
    /// Assemble a config; render type, axis, and category follow from the unit.
    pub fn new(id: impl Into<String>, label: impl Into<String>, unit: Unit, color: Rgb) -> Self {
        let label = label.into();
        let (render, axis) = if unit.is_percent() {
            (RenderType::Line, Axis::Right)
        } else {
            (RenderType::Area, Axis::Left)
        };
        Self {
            id: id.into(),
            short_label: short_label(&label),
            description: label.clone(),
            label,
            unit,
            color,
            render,
            axis,
            category: Category::for_unit(unit),
        }
    }
}

/// Truncate a label to 13 characters plus an ellipsis when it exceeds 14.
pub fn short_label(label: &str) -> String {
    if label.chars().count() > SHORT_LABEL_MAX {
        let mut out: String = label.chars().take(SHORT_LABEL_MAX - 1).collect();
        out.push('…');
        out
    } else {
        label.to_string()
    }
}

/// Named relative window used to filter displayed history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ValueEnum)]
pub enum RangeWindow {
    #[serde(rename = "1M")]
    #[value(name = "1M", alias = "1m")]
    OneMonth,
    #[serde(rename = "3M")]
    #[value(name = "3M", alias = "3m")]
    ThreeMonths,
    #[serde(rename = "6M")]
    #[value(name = "6M", alias = "6m")]
    SixMonths,
    #[serde(rename = "1Y")]
    #[value(name = "1Y", alias = "1y")]
    OneYear,
    #[serde(rename = "2Y")]
    #[value(name = "2Y", alias = "2y")]
    TwoYears,
    #[default]
    #[serde(rename = "ALL")]
    #[value(name = "ALL", alias = "all")]
    All,
}

impl RangeWindow {
    pub const ALL: [RangeWindow; 6] = [
        RangeWindow::OneMonth,
        RangeWindow::ThreeMonths,
        RangeWindow::SixMonths,
        RangeWindow::OneYear,
        RangeWindow::TwoYears,
        RangeWindow::All,
    ];

    pub fn label(self) -> &'static str {
        match self {
            RangeWindow::OneMonth => "1M",
            RangeWindow::ThreeMonths => "3M",
            RangeWindow::SixMonths => "6M",
            RangeWindow::OneYear => "1Y",
            RangeWindow::TwoYears => "2Y",
            RangeWindow::All => "ALL",
        }
    }

    fn months(self) -> Option<u32> {
        match self {
            RangeWindow::OneMonth => Some(1),
            RangeWindow::ThreeMonths => Some(3),
            RangeWindow::SixMonths => Some(6),
            RangeWindow::OneYear => Some(12),
            RangeWindow::TwoYears => Some(24),
            RangeWindow::All => None,
        }
    }

    /// First calendar day inside the window, or `None` for all-time.
    ///
    /// Calendar arithmetic: "1M" before 2024-03-15 is 2024-02-15. Days past the
    /// end of the target month clamp to its last day (2024-03-31 → 2024-02-29).
    pub fn start_date(self, today: NaiveDate) -> Option<NaiveDate> {
        let months = self.months()?;
        Some(
            today
                .checked_sub_months(Months::new(months))
                .unwrap_or(NaiveDate::MIN),
        )
    }

    /// Start of the window in epoch seconds; all-time resolves to the epoch origin.
    pub fn start_timestamp(self, today: NaiveDate) -> i64 {
        self.start_date(today)
            .map(crate::io::coerce::date_timestamp)
            .unwrap_or(0)
    }
}

impl FromStr for RangeWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        RangeWindow::ALL
            .into_iter()
            .find(|w| w.label() == upper)
            .ok_or_else(|| format!("unknown range '{s}', expected one of 1M, 3M, 6M, 1Y, 2Y, ALL"))
    }
}

/// How the retrieved payload should be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SourceFormat {
    /// Sniff: a payload starting with `[` or `{` is JSON, anything else is delimited text.
    #[default]
    Auto,
    Json,
    Csv,
}

/// Which metadata strategy resolves column identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ResolverKind {
    /// Explicit-first for JSON payloads, heuristic for delimited payloads.
    #[default]
    Auto,
    Explicit,
    Heuristic,
}

/// One retrieval location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    Http(String),
    File(PathBuf),
}

impl SourceSpec {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.starts_with("http://") || raw.starts_with("https://") {
            SourceSpec::Http(raw.to_string())
        } else {
            SourceSpec::File(PathBuf::from(raw))
        }
    }
}

impl std::fmt::Display for SourceSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceSpec::Http(url) => f.write_str(url),
            SourceSpec::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Default feed: liquidity indicators as a JSON array of row objects.
pub const DEFAULT_SOURCE_URL: &str =
    "https://raw.githubusercontent.com/dankostecki/liq/main/plynnosc_full_btc.json";

/// Raw payloads are reused for this long before the next load re-fetches.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(20);

/// A full session's configuration as understood by the pipeline.
///
/// This is derived from CLI flags, environment (`.env`), and defaults.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Retrieval locations in priority order.
    pub sources: Vec<SourceSpec>,
    pub format: SourceFormat,
    pub resolver: ResolverKind,
    /// Extra explicit mapping entries merged over the built-in ones.
    pub mapping_path: Option<PathBuf>,
    pub ttl: Duration,
    pub http_timeout: Duration,
    pub range: RangeWindow,
    pub log_file: Option<PathBuf>,
    pub verbose: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sources: vec![SourceSpec::Http(DEFAULT_SOURCE_URL.to_string())],
            format: SourceFormat::Auto,
            resolver: ResolverKind::Auto,
            mapping_path: None,
            ttl: DEFAULT_TTL,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            range: RangeWindow::All,
            log_file: None,
            verbose: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_label_truncates_past_fourteen_chars() {
        assert_eq!(short_label("WRESBAL"), "WRESBAL");
        assert_eq!(short_label("Exactly14Chars"), "Exactly14Chars");
        assert_eq!(short_label("Total Implied Liq"), "Total Implied…");
        assert_eq!(short_label("Total Implied Liq").chars().count(), 14);
    }

    #[test]
    fn config_defaults_follow_unit() {
        let rate = SeriesConfig::new("SOFR", "SOFR", Unit::Percent, Rgb(1, 2, 3));
        assert_eq!(rate.render, RenderType::Line);
        assert_eq!(rate.axis, Axis::Right);
        assert_eq!(rate.category, Category::Rates);

        let liq = SeriesConfig::new("TGA", "TGA", Unit::MillionsUsd, Rgb(1, 2, 3));
        assert_eq!(liq.render, RenderType::Area);
        assert_eq!(liq.axis, Axis::Left);
        assert_eq!(liq.category, Category::Liquidity);
        assert_eq!(liq.description, "TGA");
    }

    #[test]
    fn rgb_hex_roundtrip_and_rejects_garbage() {
        assert_eq!(Rgb::from_hex("#3b82f6"), Some(Rgb(0x3b, 0x82, 0xf6)));
        assert_eq!(Rgb(0x3b, 0x82, 0xf6).to_hex(), "#3b82f6");
        assert_eq!(Rgb::from_hex("#3b82"), None);
        assert_eq!(Rgb::from_hex("zzzzzz"), None);
    }

    #[test]
    fn range_window_uses_calendar_months() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        assert_eq!(
            RangeWindow::OneMonth.start_date(today),
            NaiveDate::from_ymd_opt(2024, 2, 15)
        );
        assert_eq!(
            RangeWindow::TwoYears.start_date(today),
            NaiveDate::from_ymd_opt(2022, 3, 15)
        );
        let end_of_march = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        assert_eq!(
            RangeWindow::OneMonth.start_date(end_of_march),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );
        assert_eq!(RangeWindow::All.start_date(today), None);
        assert_eq!(RangeWindow::All.start_timestamp(today), 0);
    }

    #[test]
    fn range_window_parses_labels() {
        assert_eq!("1m".parse::<RangeWindow>(), Ok(RangeWindow::OneMonth));
        assert_eq!("ALL".parse::<RangeWindow>(), Ok(RangeWindow::All));
        assert!("5Y".parse::<RangeWindow>().is_err());
    }

    #[test]
    fn unit_labels_parse_back() {
        for unit in [Unit::Percent, Unit::MillionsUsd, Unit::BillionsUsd, Unit::Usd, Unit::None] {
            assert_eq!(Unit::from_label(unit.label()), Some(unit));
        }
        assert_eq!(Unit::from_label(" mln usd "), Some(Unit::MillionsUsd));
        assert_eq!(Unit::from_label("bananas"), None);
    }

    #[test]
    fn source_spec_distinguishes_urls_and_paths() {
        assert_eq!(
            SourceSpec::parse("https://example.com/a.csv"),
            SourceSpec::Http("https://example.com/a.csv".to_string())
        );
        assert_eq!(
            SourceSpec::parse("data/feed.csv"),
            SourceSpec::File(PathBuf::from("data/feed.csv"))
        );
    }
}
