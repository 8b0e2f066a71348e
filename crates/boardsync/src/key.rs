//! Composite row keys
//!
//! A key spec names the fields that jointly identify a row. Keys are
//! normalized (lowercased, spaces removed) so lookups are insensitive to
//! casing and spacing drift in the source data.

use crate::row::Row;
use boardsync_common::{BoardError, Result};

/// Pseudo-field resolving to the row's group name
pub const GROUP_NAME_FIELD: &str = "Group Name";
/// Pseudo-field resolving to the row's name
pub const ROW_NAME_FIELD: &str = "Row Name";

const KEY_SEPARATOR: char = '!';

/// Ordered set of fields forming a row's identity
#[derive(Debug, Clone, Default)]
pub struct KeySpec {
    fields: Vec<String>,
}

impl KeySpec {
    pub fn new(fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Build the row's key. Pseudo-fields come first in spec order, then
    /// cell-backed fields in the row's cell order, so keys are stable no
    /// matter how the spec lists its fields.
    pub fn build(&self, row: &Row) -> Result<String> {
        if self.fields.is_empty() {
            return Err(BoardError::MissingKeyField(
                "key spec has no fields".to_string(),
            ));
        }
        let mut parts = Vec::with_capacity(self.fields.len());
        let mut missing = Vec::new();

        for field in &self.fields {
            if field.eq_ignore_ascii_case(GROUP_NAME_FIELD) {
                parts.push(key_part(GROUP_NAME_FIELD, &row.group_name));
            } else if field.eq_ignore_ascii_case(ROW_NAME_FIELD) {
                parts.push(key_part(ROW_NAME_FIELD, &row.row_name));
            }
        }

        for cell in row.cells() {
            let wanted = self
                .fields
                .iter()
                .any(|field| field.eq_ignore_ascii_case(&cell.name));
            if !wanted {
                continue;
            }
            match &cell.value {
                Some(value) => parts.push(key_part(&cell.name, &value.to_display())),
                None => missing.push(cell.name.clone()),
            }
        }

        for field in &self.fields {
            let is_pseudo = field.eq_ignore_ascii_case(GROUP_NAME_FIELD)
                || field.eq_ignore_ascii_case(ROW_NAME_FIELD);
            if !is_pseudo && !row.cells().iter().any(|c| c.name.eq_ignore_ascii_case(field)) {
                missing.push(field.clone());
            }
        }

        if !missing.is_empty() {
            return Err(BoardError::MissingKeyField(format!(
                "row [{}] is missing key fields [{}]",
                row.row_name,
                missing.join(", ")
            )));
        }
        Ok(parts.join(&KEY_SEPARATOR.to_string()))
    }

    /// Build a lookup key from caller-supplied field values, in the same
    /// normalized form `build` produces for rows.
    pub fn search_key(&self, values: &[(&str, &str)]) -> String {
        values
            .iter()
            .map(|(field, value)| key_part(field, value))
            .collect::<Vec<_>>()
            .join(&KEY_SEPARATOR.to_string())
    }
}

fn key_part(field: &str, value: &str) -> String {
    format!("{}:{}", field, value).to_lowercase().replace(' ', "")
}
