//! Column identity resolution.
//!
//! A column name (plus a profile of its numeric values) resolves to a display
//! label, a unit, and optionally a fixed id and color. Two strategies exist:
//!
//! - [`ExplicitFirst`]: look the name up in an [`ExplicitMapping`], fall back to heuristics
//! - [`HeuristicOnly`]: keyword and magnitude inference only
//!
//! The strategy is picked once per ingestion via [`select_resolver`].

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use crate::domain::{ResolverKind, Rgb, Unit};
use crate::error::AppError;
use crate::io::coerce::parse_date;
use crate::io::table::{PayloadKind, Table};

/// Display palette, assigned by column position.
pub const PALETTE: [Rgb; 12] = [
    Rgb(0x3b, 0x82, 0xf6),
    Rgb(0x22, 0xc5, 0x5e),
    Rgb(0xef, 0x44, 0x44),
    Rgb(0xa7, 0x8b, 0xfa),
    Rgb(0x38, 0xbd, 0xf8),
    Rgb(0xf5, 0x9e, 0x0b),
    Rgb(0xf9, 0x73, 0x16),
    Rgb(0xec, 0x48, 0x99),
    Rgb(0xc0, 0x84, 0xfc),
    Rgb(0x6e, 0xe7, 0xb7),
    Rgb(0x67, 0xe8, 0xf9),
    Rgb(0xf4, 0x72, 0xb6),
];

/// Header substrings that mark the date column.
const DATE_KEYWORDS: [&str; 8] = [
    "date", "data", "time", "day", "period", "timestamp", "datum", "fecha",
];

const PERCENT_KEYWORDS: [&str; 7] = ["rate", "yield", "spread", "%", "percent", "pct", "ratio"];
const MILLION_KEYWORDS: [&str; 2] = ["million", "mln"];
const BILLION_KEYWORDS: [&str; 2] = ["billion", "bln"];
const CURRENCY_KEYWORDS: [&str; 5] = ["usd", "price", "$", "btc", "eur"];

/// Inputs a resolver may inspect for one column.
#[derive(Debug, Clone, Copy)]
pub struct ColumnProfile<'a> {
    pub name: &'a str,
    /// Position among the value columns (date column excluded).
    pub position: usize,
    /// Values of the column that coerced to numbers.
    pub values: &'a [f64],
}

/// What a resolver knows about a column. `None` fields are filled in by the builder.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMeta {
    pub id: Option<String>,
    pub label: String,
    pub unit: Unit,
    pub color: Option<Rgb>,
}

pub trait MetadataResolver {
    fn name(&self) -> &'static str;
    fn resolve(&self, column: &ColumnProfile<'_>) -> ResolvedMeta;
}

/// One explicit mapping entry. Every field is an optional override.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MappingEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub color: Option<Rgb>,
}

/// Field name (lowercase) → overrides.
#[derive(Debug, Clone, Default)]
pub struct ExplicitMapping {
    entries: HashMap<String, MappingEntry>,
}

impl ExplicitMapping {
    /// The liquidity feed's known fields.
    pub fn builtin() -> Self {
        const BUILTIN: [(&str, &str, &str, &str, Rgb); 12] = [
            ("wresbal_oficjalny", "WRESBAL_MLN_USD", "WRESBAL", "M USD", PALETTE[0]),
            ("tga", "TGA_MLN_USD", "TGA", "M USD", PALETTE[1]),
            ("wresbal_implikowany", "IMPLIED_WRESBAL", "Implied WRESBAL", "M USD", PALETTE[2]),
            ("sofr_vol", "SOFRVOL", "SOFR Volume", "M USD", PALETTE[3]),
            ("total_liquidity", "TOTAL_IMPLIED_LIQ", "Total Implied Liq", "M USD", PALETTE[4]),
            ("btc_usd", "BITCOIN", "Bitcoin", "USD", PALETTE[5]),
            ("sofr_rate", "SOFR", "SOFR", "%", PALETTE[6]),
            ("on_rrp", "ONRRP", "ONRRP", "%", PALETTE[7]),
            ("spread", "SPREAD", "Spread (SOFR-RRP)", "%", PALETTE[8]),
            ("total_assets", "BANK_ASSETS", "Bank Assets", "M USD", PALETTE[9]),
            ("wresbal_to_assets_ratio", "WRESBAL_ASSETS", "WRESBAL / Assets", "%", PALETTE[10]),
            ("srf", "SRF", "SRF", "M USD", PALETTE[11]),
        ];

        let entries = BUILTIN
            .iter()
            .map(|&(field, id, label, unit, color)| {
                (
                    field.to_string(),
                    MappingEntry {
                        id: Some(id.to_string()),
                        label: Some(label.to_string()),
                        unit: Some(unit.to_string()),
                        color: Some(color),
                    },
                )
            })
            .collect();
        Self { entries }
    }

    /// Read `{ "field": { "id", "label", "unit", "color" }, ... }`.
    pub fn from_json_file(path: &Path) -> Result<Self, AppError> {
        let text = fs::read_to_string(path).map_err(|e| {
            AppError::config(format!("Failed to read mapping file '{}': {e}", path.display()))
        })?;
        let raw: HashMap<String, MappingEntry> = serde_json::from_str(&text).map_err(|e| {
            AppError::config(format!("Invalid mapping file '{}': {e}", path.display()))
        })?;
        Ok(Self {
            entries: raw
                .into_iter()
                .map(|(k, v)| (normalize_key(&k), v))
                .collect(),
        })
    }

    /// Layer `other` over `self` field by field: a field set in `other` wins,
    /// a field it leaves out keeps the value from `self`.
    pub fn merge(mut self, other: ExplicitMapping) -> Self {
        for (field, overrides) in other.entries {
            let entry = self.entries.entry(field).or_default();
            if overrides.id.is_some() {
                entry.id = overrides.id;
            }
            if overrides.label.is_some() {
                entry.label = overrides.label;
            }
            if overrides.unit.is_some() {
                entry.unit = overrides.unit;
            }
            if overrides.color.is_some() {
                entry.color = overrides.color;
            }
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&MappingEntry> {
        self.entries.get(&normalize_key(name))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn normalize_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Keyword heuristics, then value magnitude.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicOnly;

impl MetadataResolver for HeuristicOnly {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    fn resolve(&self, column: &ColumnProfile<'_>) -> ResolvedMeta {
        ResolvedMeta {
            id: None,
            label: column.name.trim().to_string(),
            unit: infer_unit(column.name, column.values),
            color: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExplicitFirst {
    mapping: ExplicitMapping,
}

impl ExplicitFirst {
    pub fn new(mapping: ExplicitMapping) -> Self {
        Self { mapping }
    }
}

impl MetadataResolver for ExplicitFirst {
    fn name(&self) -> &'static str {
        "explicit-first"
    }

    fn resolve(&self, column: &ColumnProfile<'_>) -> ResolvedMeta {
        let fallback = HeuristicOnly.resolve(column);
        let Some(entry) = self.mapping.get(column.name) else {
            return fallback;
        };
        ResolvedMeta {
            id: entry.id.clone().filter(|id| !id.trim().is_empty()),
            label: entry.label.clone().unwrap_or(fallback.label),
            unit: entry
                .unit
                .as_deref()
                .and_then(|label| {
                    let unit = Unit::from_label(label);
                    if unit.is_none() {
                        warn!(
                            field = column.name,
                            unit = label,
                            "unknown unit in mapping, inferring instead"
                        );
                    }
                    unit
                })
                .unwrap_or(fallback.unit),
            color: entry.color,
        }
    }
}

/// `Auto` picks explicit-first for JSON payloads and heuristics for delimited text.
pub fn select_resolver(
    kind: ResolverKind,
    payload: PayloadKind,
    mapping: &ExplicitMapping,
) -> Box<dyn MetadataResolver> {
    let explicit = match kind {
        ResolverKind::Explicit => true,
        ResolverKind::Heuristic => false,
        ResolverKind::Auto => payload == PayloadKind::Json,
    };
    if explicit {
        Box::new(ExplicitFirst::new(mapping.clone()))
    } else {
        Box::new(HeuristicOnly)
    }
}

pub fn infer_unit(name: &str, values: &[f64]) -> Unit {
    unit_from_name(name).unwrap_or_else(|| unit_from_magnitude(values))
}

pub fn unit_from_name(name: &str) -> Option<Unit> {
    let lower = name.to_lowercase();
    let has = |keywords: &[&str]| keywords.iter().any(|k| lower.contains(k));
    if has(&PERCENT_KEYWORDS) {
        Some(Unit::Percent)
    } else if has(&MILLION_KEYWORDS) {
        Some(Unit::MillionsUsd)
    } else if has(&BILLION_KEYWORDS) {
        Some(Unit::BillionsUsd)
    } else if has(&CURRENCY_KEYWORDS) {
        Some(Unit::Usd)
    } else {
        None
    }
}

/// Mean |value| above 100 000 → millions; below 50 → percent; else currency.
pub fn unit_from_magnitude(values: &[f64]) -> Unit {
    if values.is_empty() {
        return Unit::None;
    }
    let mean = values.iter().map(|v| v.abs()).sum::<f64>() / values.len() as f64;
    if mean > 100_000.0 {
        Unit::MillionsUsd
    } else if mean < 50.0 {
        Unit::Percent
    } else {
        Unit::Usd
    }
}

/// Pick the date column; `None` only for a header-less table.
///
/// Keyword match first, then the first column whose first row parses as a
/// date, then column 0. Only the first data row is ever date-parsed.
pub fn detect_date_column(table: &Table) -> Option<usize> {
    if table.headers.is_empty() {
        return None;
    }
    let by_keyword = table.headers.iter().position(|h| {
        let lower = h.to_lowercase();
        DATE_KEYWORDS.iter().any(|k| lower.contains(k))
    });
    let by_value = || (0..table.headers.len()).find(|&col| parse_date(table.cell(0, col)).is_some());
    Some(by_keyword.or_else(by_value).unwrap_or(0))
}

/// Uppercase, whitespace → `_`, anything outside `[A-Z0-9_]` dropped.
pub fn derive_id(name: &str) -> String {
    name.trim()
        .chars()
        .filter_map(|c| {
            if c.is_whitespace() {
                Some('_')
            } else {
                let c = c.to_ascii_uppercase();
                (c.is_ascii_alphanumeric() || c == '_').then_some(c)
            }
        })
        .collect()
}

/// Hands out unique ids; repeats get `_2`, `_3`, ...
#[derive(Debug, Default)]
pub struct IdAllocator {
    taken: HashSet<String>,
}

impl IdAllocator {
    pub fn allocate(&mut self, base: &str, position: usize) -> String {
        let base = if base.is_empty() {
            format!("SERIES_{}", position + 1)
        } else {
            base.to_string()
        };
        let mut candidate = base.clone();
        let mut n = 2;
        while self.taken.contains(&candidate) {
            candidate = format!("{base}_{n}");
            n += 1;
        }
        self.taken.insert(candidate.clone());
        candidate
    }
}

/// Hands out palette colors, skipping ones already in use.
#[derive(Debug, Default)]
pub struct Palette {
    used: HashSet<Rgb>,
}

impl Palette {
    pub fn assign(&mut self, explicit: Option<Rgb>, position: usize) -> Rgb {
        let color = explicit.unwrap_or_else(|| {
            let start = position % PALETTE.len();
            (0..PALETTE.len())
                .map(|i| PALETTE[(start + i) % PALETTE.len()])
                .find(|c| !self.used.contains(c))
                .unwrap_or(PALETTE[start])
        });
        self.used.insert(color);
        color
    }
}
