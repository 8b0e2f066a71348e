//! Cells with dirty tracking
//!
//! A cell remembers the last value confirmed by the remote alongside the
//! working value. `modified` flips only when the display forms differ, so
//! re-assigning an identical value never produces a write.

use crate::schema::{Column, ColumnType};
use crate::value::CellValue;

/// One typed field of a row
#[derive(Debug, Clone)]
pub struct Cell {
    /// Stable remote column id
    pub id: String,
    /// Deduplicated display name, unique within a row
    pub name: String,
    pub column_type: ColumnType,
    /// Valid labels when the column is label-bearing
    pub labels: Vec<String>,
    pub value: Option<CellValue>,
    /// Last value confirmed by the remote
    pub previous_value: Option<CellValue>,
    pub modified: bool,
}

impl Cell {
    /// An unset cell shaped after a column definition
    pub fn empty(column: &Column) -> Self {
        Self {
            id: column.id.clone(),
            name: column.name.clone(),
            column_type: column.column_type,
            labels: column.labels.clone(),
            value: None,
            previous_value: None,
            modified: false,
        }
    }

    /// Cell carrying a remote-confirmed value. Empty text hydrates as an
    /// absent value.
    pub fn hydrated(column: &Column, text: &str) -> Self {
        let mut cell = Cell::empty(column);
        if !text.is_empty() {
            let value = CellValue::parse(column.column_type, text);
            cell.value = Some(value.clone());
            cell.previous_value = Some(value);
        }
        cell
    }

    /// The synthetic name cell every row carries; the remote treats the row
    /// name as a pseudo-column with id `name`.
    pub fn name_cell(row_name: &str) -> Self {
        Self {
            id: "name".to_string(),
            name: "Name".to_string(),
            column_type: ColumnType::Text,
            labels: Vec::new(),
            value: Some(CellValue::Text(row_name.to_string())),
            previous_value: Some(CellValue::Text(row_name.to_string())),
            modified: false,
        }
    }

    /// Assign a value. Label-bearing status cells silently ignore values
    /// outside the label set; dropdowns accept anything since the write can
    /// create missing labels remotely.
    pub fn set_value(&mut self, value: CellValue) {
        if self.column_type == ColumnType::Status && !self.labels.is_empty() {
            let shown = value.to_display();
            if !self.labels.iter().any(|label| *label == shown) {
                tracing::warn!("value [{}] not in labels of [{}], ignoring", shown, self.name);
                return;
            }
        }
        let changed = match &self.previous_value {
            Some(previous) => previous.to_display() != value.to_display(),
            None => true,
        };
        self.value = Some(value);
        if changed {
            self.modified = true;
        }
    }

    /// Assign display text, parsed under this cell's type
    pub fn set_text(&mut self, text: &str) {
        self.set_value(CellValue::parse(self.column_type, text));
    }

    pub fn is_set(&self) -> bool {
        self.value.is_some()
    }

    /// Display text of the working value, empty when unset
    pub fn display(&self) -> String {
        self.value
            .as_ref()
            .map(CellValue::to_display)
            .unwrap_or_default()
    }

    /// Mark the working value as confirmed by the remote
    pub fn clear_modified(&mut self) {
        self.previous_value = self.value.clone();
        self.modified = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, ColumnType};
    use crate::value::CellValue;

    fn status_column() -> Column {
        let mut column = Column::new(1, "status", "Status", ColumnType::Status);
        column.labels = vec!["Done".to_string(), "Stuck".to_string()];
        column
    }

    #[test]
    fn test_hydrated_cell_starts_clean() {
        let column = Column::new(0, "text1", "Team", ColumnType::Text);
        let cell = Cell::hydrated(&column, "Platform");
        assert!(cell.is_set());
        assert!(!cell.modified);
        assert_eq!(cell.display(), "Platform");
    }

    #[test]
    fn test_empty_text_hydrates_as_unset() {
        let column = Column::new(0, "text1", "Team", ColumnType::Text);
        let cell = Cell::hydrated(&column, "");
        assert!(!cell.is_set());
        assert_eq!(cell.display(), "");
    }

    #[test]
    fn test_modified_only_when_display_differs() {
        let column = Column::new(0, "text1", "Team", ColumnType::Text);
        let mut cell = Cell::hydrated(&column, "Platform");

        cell.set_text("Platform");
        assert!(!cell.modified);

        cell.set_text("Infra");
        assert!(cell.modified);
    }

    #[test]
    fn test_status_rejects_unknown_label_silently() {
        let mut cell = Cell::empty(&status_column());
        cell.set_text("Working");
        assert!(!cell.is_set());
        assert!(!cell.modified);

        cell.set_text("Done");
        assert_eq!(cell.display(), "Done");
        assert!(cell.modified);
    }

    #[test]
    fn test_dropdown_accepts_any_value() {
        let mut column = Column::new(2, "dropdown1", "Region", ColumnType::Dropdown);
        column.labels = vec!["East".to_string()];
        let mut cell = Cell::empty(&column);
        cell.set_text("North");
        assert_eq!(cell.display(), "North");
        assert!(cell.modified);
    }

    #[test]
    fn test_clear_modified_resets_baseline() {
        let column = Column::new(0, "text1", "Team", ColumnType::Text);
        let mut cell = Cell::empty(&column);
        cell.set_text("Infra");
        assert!(cell.modified);

        cell.clear_modified();
        assert!(!cell.modified);
        // same value again stays clean against the new baseline
        cell.set_text("Infra");
        assert!(!cell.modified);
    }

    #[test]
    fn test_name_cell() {
        let cell = Cell::name_cell("Row One");
        assert_eq!(cell.id, "name");
        assert_eq!(cell.display(), "Row One");
        assert!(!cell.modified);
    }

    #[test]
    fn test_checkbox_cell_round_trip() {
        let column = Column::new(3, "check", "Active", ColumnType::Checkbox);
        let mut cell = Cell::hydrated(&column, "v");
        assert_eq!(cell.value, Some(CellValue::Bool(true)));

        cell.set_text("0");
        assert_eq!(cell.value, Some(CellValue::Bool(false)));
        assert!(cell.modified);
    }
}
