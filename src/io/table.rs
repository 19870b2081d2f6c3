//! Tabular parsing: delimited text or JSON records → header list + rows.
//!
//! Both shapes end up in the same [`Table`], so the series builder never needs
//! to know which one the source delivered.

use serde_json::Value;

use crate::domain::SourceFormat;
use crate::error::AppError;

/// Which payload shape was actually parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Json,
    Delimited,
}

/// Header row plus positionally aligned data rows.
///
/// Every row has exactly `headers.len()` cells; missing cells are empty strings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn column(&self, col: usize) -> impl Iterator<Item = &str> + '_ {
        self.rows
            .iter()
            .map(move |r| r.get(col).map(String::as_str).unwrap_or(""))
    }

    fn push_row(&mut self, mut row: Vec<String>) {
        row.resize(self.headers.len(), String::new());
        self.rows.push(row);
    }
}

/// Parse a payload according to `format`; `Auto` sniffs the first non-blank char.
pub fn parse_payload(text: &str, format: SourceFormat) -> Result<(Table, PayloadKind), AppError> {
    let kind = match format {
        SourceFormat::Json => PayloadKind::Json,
        SourceFormat::Csv => PayloadKind::Delimited,
        SourceFormat::Auto if looks_like_json(text) => PayloadKind::Json,
        SourceFormat::Auto => PayloadKind::Delimited,
    };
    let table = match kind {
        PayloadKind::Json => parse_json(text)?,
        PayloadKind::Delimited => parse_delimited(text)?,
    };
    Ok((table, kind))
}

pub fn looks_like_json(text: &str) -> bool {
    let s = text.trim_start_matches('\u{feff}').trim_start();
    s.starts_with('[') || s.starts_with('{')
}

/// Normalize `\r\n` / `\r` to `\n` and drop blank lines.
pub fn split_lines(text: &str) -> Vec<&str> {
    text.split(['\n', '\r'])
        .filter(|line| !line.trim().is_empty())
        .collect()
}

/// Tokenize one delimited line. Quoted fields may contain commas and doubled quotes.
pub fn tokenize_line(line: &str) -> Vec<String> {
    let mut reader = csv_reader(line.as_bytes());
    match reader.records().next() {
        Some(Ok(record)) => record.iter().map(str::to_string).collect(),
        _ => Vec::new(),
    }
}

/// Parse comma-delimited text with a header row.
pub fn parse_delimited(text: &str) -> Result<Table, AppError> {
    if !text.contains(',') {
        return Err(AppError::format(
            "Payload does not look like delimited text (no ',' separator found).",
        ));
    }
    let lines = split_lines(text);
    if lines.len() < 2 {
        return Err(AppError::format(format!(
            "Delimited payload has no data rows ({} non-blank line(s)).",
            lines.len()
        )));
    }

    let joined = lines.join("\n");
    let mut reader = csv_reader(joined.as_bytes());
    let mut records = reader.records();

    let header_record = records
        .next()
        .ok_or_else(|| AppError::format("Delimited payload has no header row."))?
        .map_err(|e| AppError::format(format!("Failed to read header row: {e}")))?;

    let mut table = Table {
        headers: header_record.iter().map(normalize_header).collect(),
        rows: Vec::with_capacity(lines.len() - 1),
    };

    for (idx, record) in records.enumerate() {
        let record = record.map_err(|e| {
            AppError::format(format!("Failed to read delimited row {}: {e}", idx + 2))
        })?;
        table.push_row(record.iter().map(str::to_string).collect());
    }

    Ok(table)
}

/// Parse a JSON payload: an array of row objects, or an object wrapping one.
pub fn parse_json(text: &str) -> Result<Table, AppError> {
    let value: Value = serde_json::from_str(text.trim_start_matches('\u{feff}'))
        .map_err(|e| AppError::format(format!("Failed to parse JSON payload: {e}")))?;
    parse_records(&value)
}

/// Flatten structured records into a table; keys keep first-seen order.
pub fn parse_records(value: &Value) -> Result<Table, AppError> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(map) => map
            .values()
            .find_map(|v| v.as_array().filter(|a| a.iter().any(Value::is_object)))
            .ok_or_else(|| AppError::format("JSON object payload has no array of records."))?,
        _ => return Err(AppError::format("JSON payload is neither an array nor an object.")),
    };

    let objects: Vec<_> = items.iter().filter_map(Value::as_object).collect();
    if objects.is_empty() {
        return Err(AppError::format("JSON payload contains no records."));
    }

    let mut headers: Vec<String> = Vec::new();
    for obj in &objects {
        for key in obj.keys() {
            if !headers.iter().any(|h| h == key) {
                headers.push(key.clone());
            }
        }
    }

    let mut table = Table {
        headers,
        rows: Vec::with_capacity(objects.len()),
    };
    for obj in objects {
        let row = table
            .headers
            .iter()
            .map(|h| obj.get(h).map(cell_text).unwrap_or_default())
            .collect();
        table.push_row(row);
    }
    Ok(table)
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn normalize_header(name: &str) -> String {
    // Spreadsheet exports often prefix the first header with a UTF-8 BOM.
    name.trim().trim_start_matches('\u{feff}').trim().to_string()
}

fn csv_reader(bytes: &[u8]) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn quoted_field_with_embedded_comma_is_one_field() {
        assert_eq!(tokenize_line(r#"a,"b,c",d"#), vec!["a", "b,c", "d"]);
        assert_eq!(tokenize_line(r#"x,"say ""hi""",z"#), vec!["x", r#"say "hi""#, "z"]);
    }

    #[test]
    fn delimited_rows_are_padded_and_blank_lines_dropped() {
        let text = "\u{feff}date, A ,B\r\n2024-01-01,1,2\r\n\r\n2024-01-02,3\n";
        let table = parse_delimited(text).unwrap();
        assert_eq!(table.headers, vec!["date", "A", "B"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1], vec!["2024-01-02", "3", ""]);
        assert_eq!(table.cell(1, 2), "");
        assert_eq!(table.cell(9, 9), "");
    }

    #[test]
    fn delimited_requires_data_rows_and_a_separator() {
        let err = parse_delimited("date,A\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);

        let err = parse_delimited("<html>\n<body>oops</body>\n</html>").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn json_records_keep_first_seen_key_order() {
        let text = r#"[
            {"date": "2024-01-01", "tga": 700000, "sofr_rate": null},
            {"date": "2024-01-02", "extra": "x", "tga": 710000.5}
        ]"#;
        let table = parse_json(text).unwrap();
        assert_eq!(table.headers, vec!["date", "tga", "sofr_rate", "extra"]);
        assert_eq!(table.rows[0], vec!["2024-01-01", "700000", "", ""]);
        assert_eq!(table.rows[1], vec!["2024-01-02", "710000.5", "", "x"]);
    }

    #[test]
    fn json_must_contain_records() {
        assert_eq!(parse_json("[]").unwrap_err().kind(), ErrorKind::Format);
        assert_eq!(parse_json("[1,2]").unwrap_err().kind(), ErrorKind::Format);
        assert_eq!(parse_json("{oops").unwrap_err().kind(), ErrorKind::Format);
        assert!(parse_json(r#"{"data": [{"date": "2024-01-01"}]}"#).is_ok());
    }

    #[test]
    fn auto_format_sniffs_payload() {
        let (_, kind) = parse_payload("  [{\"date\":\"2024-01-01\"}]", SourceFormat::Auto).unwrap();
        assert_eq!(kind, PayloadKind::Json);
        let (_, kind) = parse_payload("date,A\n2024-01-01,1", SourceFormat::Auto).unwrap();
        assert_eq!(kind, PayloadKind::Delimited);
    }
}
