//! Sub-rows: child rows linked under a parent row
//!
//! The remote models children as rows of a hidden sub-board, referenced
//! from the parent through a reserved column. The sub-board has its own
//! column schema, discovered lazily from the first fetched child.

use crate::board::Board;
use crate::query::{ItemsByIdsQuery, SubitemIdsQuery, SubitemInsertMutation, UpdateMutation};
use crate::row::Row;
use crate::schema::{clean_name, Column, ColumnRegistry, ColumnType};
use crate::select::rows_from_items;
use boardsync_common::{BoardError, Result};
use boardsync_http::Connection;

/// Reserved column ids the remote uses for the sub-row reference cell
pub const SUB_COLUMN_IDS: [&str; 2] = ["subitems", "subitems2"];

/// Read the child row ids from a parent row's reference cell. The cell's
/// raw value is a JSON document listing linked ids.
pub fn sub_row_ids(
    connection: &Connection,
    row_id: &str,
    sub_column_id: &str,
) -> Result<Vec<String>> {
    let query = SubitemIdsQuery {
        row_id,
        sub_column_id,
    };
    let response = connection.execute(&query.build())?;
    let raw = response["data"]["items"][0]["column_values"][0]["value"]
        .as_str()
        .unwrap_or_default();
    if raw.is_empty() {
        return Ok(Vec::new());
    }

    let linked: serde_json::Value = serde_json::from_str(raw)?;
    let ids = linked["linkedPulseIds"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|entry| {
            entry["linkedPulseId"]
                .as_i64()
                .map(|id| id.to_string())
                .or_else(|| entry["linkedPulseId"].as_str().map(str::to_string))
        })
        .collect();
    Ok(ids)
}

// The sub-board schema is not queryable directly, so the column set is
// reconstructed from the first child's reported column values.
fn sub_registry_from_items(items: &[serde_json::Value]) -> ColumnRegistry {
    let Some(first) = items.first() else {
        return ColumnRegistry::default();
    };
    let columns = first["column_values"]
        .as_array()
        .into_iter()
        .flatten()
        .enumerate()
        .map(|(index, entry)| {
            Column::new(
                index,
                entry["id"].as_str().unwrap_or_default(),
                clean_name(entry["column"]["title"].as_str().unwrap_or_default()),
                ColumnType::from_remote(entry["type"].as_str().unwrap_or_default()),
            )
        });
    ColumnRegistry::from_columns(columns)
}

/// Fetch full child rows by id, chunked to the remote's by-id read cap.
/// Returns the sub-board registry, the hydrated rows, and the sub-board id
/// when the remote reported one.
pub fn fetch_sub_rows(
    connection: &Connection,
    ids: &[String],
) -> Result<(ColumnRegistry, Vec<Row>, Option<String>)> {
    let mut items: Vec<serde_json::Value> = Vec::new();
    for query in ItemsByIdsQuery::chunks(ids) {
        let response = connection.execute(&query.build())?;
        items.extend(
            response["data"]["items"]
                .as_array()
                .cloned()
                .unwrap_or_default(),
        );
    }

    let registry = sub_registry_from_items(&items);
    let sub_board_id = items
        .first()
        .and_then(|item| item["board"]["id"].as_str().map(str::to_string));
    let rows = rows_from_items(&registry, &items, None);
    Ok((registry, rows, sub_board_id))
}

impl Board {
    /// Load the sub-rows of a row into `row.sub_rows`, discovering the
    /// sub-board schema on first use. Returns the number of children.
    pub fn load_sub_rows(&mut self, slot: usize) -> Result<usize> {
        let (row_id, sub_column_id) = {
            let row = self
                .row(slot)
                .ok_or_else(|| BoardError::NotFound(format!("no row at slot [{}]", slot)))?;
            let row_id = row.row_id.clone().ok_or_else(|| {
                BoardError::Internal("cannot load sub-rows of a row with no remote id".to_string())
            })?;
            let sub_column_id = match row.sub_column_id.clone() {
                Some(id) => id,
                None => return Ok(0),
            };
            (row_id, sub_column_id)
        };

        let ids = sub_row_ids(self.connection(), &row_id, &sub_column_id)?;
        if ids.is_empty() {
            return Ok(0);
        }
        let connection = self.connection().clone();
        let (registry, rows, sub_board_id) = fetch_sub_rows(&connection, &ids)?;

        if self.sub_registry.is_none() {
            self.sub_registry = Some(registry);
        }
        let count = rows.len();
        let row = self
            .row_mut(slot)
            .ok_or_else(|| BoardError::NotFound(format!("no row at slot [{}]", slot)))?;
        row.sub_board_id = sub_board_id;
        row.sub_rows = rows;
        tracing::debug!("loaded {} sub-rows for row [{}]", count, row_id);
        Ok(count)
    }

    /// Create a child under a parent row. The response names the sub-board,
    /// which later sub-row updates are addressed to.
    pub fn insert_sub_row(&mut self, slot: usize, mut sub_row: Row) -> Result<()> {
        let parent_id = {
            let row = self
                .row(slot)
                .ok_or_else(|| BoardError::NotFound(format!("no row at slot [{}]", slot)))?;
            row.row_id.clone().ok_or_else(|| {
                BoardError::Internal("cannot add a sub-row under a row with no remote id".to_string())
            })?
        };

        let response = {
            let cells = sub_row.modified_cells();
            let mutation = SubitemInsertMutation {
                parent_row_id: &parent_id,
                row_name: &sub_row.row_name,
                cells: &cells,
            };
            self.connection().execute(&mutation.build())?
        };

        let created = &response["data"]["create_subitem"];
        let sub_row_id = created["id"]
            .as_str()
            .map(str::to_string)
            .or_else(|| created["id"].as_i64().map(|id| id.to_string()))
            .ok_or_else(|| {
                BoardError::Internal("sub-row insert response carried no id".to_string())
            })?;
        let sub_board_id = created["board"]["id"]
            .as_str()
            .map(str::to_string)
            .or_else(|| created["board"]["id"].as_i64().map(|id| id.to_string()));

        sub_row.row_id = Some(sub_row_id);
        sub_row.on_remote = true;
        sub_row.clear_modified();

        let row = self
            .row_mut(slot)
            .ok_or_else(|| BoardError::NotFound(format!("no row at slot [{}]", slot)))?;
        if row.sub_board_id.is_none() {
            row.sub_board_id = sub_board_id;
        }
        row.sub_rows.push(sub_row);
        Ok(())
    }

    /// Push a child row's modified cells, addressed to the sub-board
    pub fn update_sub_row(&mut self, slot: usize, sub_slot: usize) -> Result<()> {
        let (sub_board_id, sub_row_id, payload) = {
            let row = self
                .row(slot)
                .ok_or_else(|| BoardError::NotFound(format!("no row at slot [{}]", slot)))?;
            let sub_row = row.sub_rows.get(sub_slot).ok_or_else(|| {
                BoardError::NotFound(format!("no sub-row at slot [{}]", sub_slot))
            })?;
            let sub_board_id = row
                .sub_board_id
                .clone()
                .ok_or_else(|| BoardError::Internal("sub-board id is not known yet".to_string()))?
                .parse::<i64>()
                .map_err(|_| BoardError::Internal("sub-board id is not numeric".to_string()))?;
            let sub_row_id = sub_row.row_id.clone().ok_or_else(|| {
                BoardError::Internal("cannot update a sub-row with no remote id".to_string())
            })?;

            let cells = sub_row.modified_cells();
            if cells.is_empty() {
                return Ok(());
            }
            let mutation = UpdateMutation {
                board_id: sub_board_id,
                row_id: &sub_row_id,
                cells: &cells,
                create_missing_labels: false,
            };
            let payload = mutation.build();
            (sub_board_id, sub_row_id, payload)
        };

        self.connection().execute(&payload)?;
        tracing::debug!(
            "updated sub-row [{}] on sub-board [{}]",
            sub_row_id,
            sub_board_id
        );
        self.row_mut(slot)
            .and_then(|row| row.sub_rows.get_mut(sub_slot))
            .ok_or_else(|| BoardError::NotFound(format!("no sub-row at slot [{}]", sub_slot)))?
            .clear_modified();
        Ok(())
    }
}
