//! Rows: the addressable unit of a board
//!
//! A row owns its cells in column order and resolves them by deduplicated
//! display name. Rows created locally have no remote id until the first
//! insert confirms one.

use crate::cell::Cell;
use crate::value::CellValue;
use boardsync_common::{BoardError, Result};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Default)]
pub struct Row {
    /// Remote item id; absent until the row exists remotely
    pub row_id: Option<String>,
    pub row_name: String,
    pub group_id: String,
    pub group_name: String,
    /// Whether the remote currently holds this row
    pub on_remote: bool,
    cells: Vec<Cell>,
    by_name: HashMap<String, usize>,
    /// Composite key, set when the board has a key spec
    pub key: Option<String>,
    pub sub_rows: Vec<Row>,
    /// Board hosting this row's sub-rows, learned from the first sub-row
    pub sub_board_id: Option<String>,
    /// Column id of the sub-row reference cell, when the row has one
    pub sub_column_id: Option<String>,
}

impl Row {
    /// A local-only row positioned in a group
    pub fn empty(row_name: &str, group_id: &str, group_name: &str) -> Self {
        let mut row = Row {
            row_name: row_name.to_string(),
            group_id: group_id.to_string(),
            group_name: group_name.to_string(),
            ..Row::default()
        };
        row.push_cell(Cell::name_cell(row_name));
        row
    }

    /// Append a cell. First cell wins on a name collision; later duplicates
    /// are dropped so lookups stay unambiguous.
    pub fn push_cell(&mut self, cell: Cell) {
        if self.by_name.contains_key(&cell.name) {
            return;
        }
        let slot = self.cells.len();
        self.by_name.insert(cell.name.clone(), slot);
        self.cells.push(cell);
    }

    pub fn cell(&self, name: &str) -> Option<&Cell> {
        self.by_name.get(name).map(|slot| &self.cells[*slot])
    }

    pub fn cell_mut(&mut self, name: &str) -> Option<&mut Cell> {
        let slot = *self.by_name.get(name)?;
        Some(&mut self.cells[slot])
    }

    pub fn has_cell(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Assign a typed value to a named cell
    pub fn set(&mut self, name: &str, value: CellValue) -> Result<()> {
        match self.cell_mut(name) {
            Some(cell) => {
                cell.set_value(value);
                Ok(())
            }
            None => Err(BoardError::SchemaMismatch(format!(
                "no column [{}] on row [{}]",
                name, self.row_name
            ))),
        }
    }

    /// Assign display text to a named cell, parsed under the cell's type
    pub fn set_text(&mut self, name: &str, text: &str) -> Result<()> {
        match self.cell_mut(name) {
            Some(cell) => {
                cell.set_text(text);
                Ok(())
            }
            None => Err(BoardError::SchemaMismatch(format!(
                "no column [{}] on row [{}]",
                name, self.row_name
            ))),
        }
    }

    /// Cells in column order
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Cells carrying an unconfirmed edit with a value to write
    pub fn modified_cells(&self) -> Vec<&Cell> {
        self.cells
            .iter()
            .filter(|cell| cell.modified && cell.value.is_some())
            .collect()
    }

    pub fn is_modified(&self) -> bool {
        self.cells.iter().any(|cell| cell.modified)
    }

    /// Mark every cell as confirmed; called after a successful write
    pub fn clear_modified(&mut self) {
        for cell in &mut self.cells {
            cell.clear_modified();
        }
    }

    /// Display snapshot of all set cells, ordered by cell name
    pub fn name_value_map(&self) -> BTreeMap<String, String> {
        self.cells
            .iter()
            .filter(|cell| cell.is_set())
            .map(|cell| (cell.name.clone(), cell.display()))
            .collect()
    }
}

impl std::fmt::Display for Row {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}]",
            self.row_name,
            self.row_id.as_deref().unwrap_or("local")
        )
    }
}

/// Display-name → row-slot multimap; rows that share a name keep their
/// discovery order.
#[derive(Debug, Clone, Default)]
pub struct RowMultimap {
    inner: HashMap<String, Vec<usize>>,
}

impl RowMultimap {
    pub fn insert(&mut self, name: &str, slot: usize) {
        self.inner.entry(name.to_string()).or_default().push(slot);
    }

    /// Slots of every row carrying the name, in discovery order
    pub fn get(&self, name: &str) -> &[usize] {
        self.inner.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn remove_slot(&mut self, name: &str, slot: usize) {
        if let Some(slots) = self.inner.get_mut(name) {
            slots.retain(|s| *s != slot);
            if slots.is_empty() {
                self.inner.remove(name);
            }
        }
    }

    /// Renumber slots after a removal shifted the row vector
    pub fn shift_after(&mut self, removed: usize) {
        for slots in self.inner.values_mut() {
            for slot in slots.iter_mut() {
                if *slot > removed {
                    *slot -= 1;
                }
            }
        }
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }
}
