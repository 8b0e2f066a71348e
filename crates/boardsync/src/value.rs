//! Tagged cell values
//!
//! Remote responses carry every value as display text; the tag is chosen
//! from the column's declared type when a cell is hydrated. Writes encode
//! each variant into the shape the remote's mutation API expects.

use crate::schema::{Column, ColumnType};
use chrono::{NaiveDate, NaiveDateTime};

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A typed cell value. Numbers are kept as raw text so values round-trip
/// without float formatting drift.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(String),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Link { url: String, text: Option<String> },
}

impl CellValue {
    /// Interpret display text under a column type. Empty text never reaches
    /// here; hydration maps it to an absent value instead.
    pub fn parse(column_type: ColumnType, text: &str) -> Self {
        match column_type {
            ColumnType::Checkbox => {
                let truthy = matches!(text, "v" | "true" | "1");
                CellValue::Bool(truthy)
            }
            ColumnType::Number => CellValue::Number(text.to_string()),
            ColumnType::Date | ColumnType::DateTime => Self::parse_temporal(text),
            ColumnType::Link => CellValue::Link {
                url: text.to_string(),
                text: None,
            },
            _ => CellValue::Text(text.to_string()),
        }
    }

    // Datetime columns sometimes report a bare date, and date columns a
    // full timestamp; try the longer format first.
    fn parse_temporal(text: &str) -> Self {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(text, DATETIME_FORMAT) {
            return CellValue::DateTime(datetime);
        }
        if let Ok(date) = NaiveDate::parse_from_str(text, DATE_FORMAT) {
            return CellValue::Date(date);
        }
        CellValue::Text(text.to_string())
    }

    /// Canonical display text. Comparisons (dirty tracking, client-side
    /// filters without an operator) work over this form.
    pub fn to_display(&self) -> String {
        match self {
            CellValue::Text(text) | CellValue::Number(text) => text.clone(),
            CellValue::Bool(flag) => if *flag { "true" } else { "false" }.to_string(),
            CellValue::Date(date) => date.format(DATE_FORMAT).to_string(),
            CellValue::DateTime(datetime) => datetime.format(DATETIME_FORMAT).to_string(),
            CellValue::Link { url, .. } => url.clone(),
        }
    }

    /// Seconds since epoch for temporal values, used for ordered filter
    /// comparisons over date columns.
    pub fn timestamp(&self) -> Option<i64> {
        match self {
            CellValue::Date(date) => Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp()),
            CellValue::DateTime(datetime) => Some(datetime.and_utc().timestamp()),
            _ => None,
        }
    }

    /// Encode for the remote's column_values mutation argument. The column
    /// is consulted for the link-text fallback only.
    pub fn encode(&self, column: &Column) -> serde_json::Value {
        match self {
            CellValue::Bool(flag) => serde_json::json!({
                "checked": if *flag { "true" } else { "false" }
            }),
            CellValue::Date(date) => serde_json::json!({
                "date": date.format(DATE_FORMAT).to_string()
            }),
            CellValue::DateTime(datetime) => serde_json::json!({
                "date": datetime.format(DATE_FORMAT).to_string(),
                "time": datetime.format("%H:%M:%S").to_string()
            }),
            CellValue::Link { url, text } => serde_json::json!({
                "url": url,
                "text": text.clone().unwrap_or_else(|| column.title.clone())
            }),
            CellValue::Text(text) | CellValue::Number(text) => {
                serde_json::Value::String(text.clone())
            }
        }
    }
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_display())
    }
}
