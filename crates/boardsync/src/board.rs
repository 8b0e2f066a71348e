//! The board aggregate
//!
//! A `Board` mirrors one remote board: its schema registry, groups, and the
//! rows selected so far. All writes go through the board so local state and
//! the remote stay consistent; local bookkeeping is only touched after the
//! remote confirms a write.

use crate::cell::Cell;
use crate::key::KeySpec;
use crate::query::{
    change_set, CreateGroupMutation, DeleteMutation, InsertMutation, ItemCountQuery,
    SchemaQuery, SingleColumnUpdate, UpdateMutation,
};
use crate::row::{Row, RowMultimap};
use crate::schema::{clean_name, ColumnRegistry};
use crate::select::{self, SelectOptions};
use boardsync_common::{BoardError, Result};
use boardsync_http::Connection;
use std::collections::HashMap;
use std::sync::Arc;

/// A named section of rows
#[derive(Debug, Clone)]
pub struct Group {
    pub id: String,
    pub title: String,
}

#[derive(Clone)]
pub struct Board {
    connection: Arc<Connection>,
    pub board_id: i64,
    pub name: String,
    pub permissions: String,
    pub registry: ColumnRegistry,
    /// Column registry of the sub-board, learned on first sub-row fetch
    pub sub_registry: Option<ColumnRegistry>,
    groups: Vec<Group>,
    rows: Vec<Row>,
    row_multimap: RowMultimap,
    row_keys: HashMap<String, usize>,
    key_spec: KeySpec,
    /// Set when verification finds the remote schema drifted
    pub was_altered: bool,
    pub missing_columns: Vec<String>,
    pub missing_labels: Vec<String>,
}

impl Board {
    /// Load a board's schema and groups. Rows come later through
    /// [`Board::select`].
    pub fn load(connection: Arc<Connection>, key_spec: KeySpec) -> Result<Self> {
        let board_id = connection.board_id();
        tracing::info!("loading board [{}]", board_id);

        let response = connection.execute(&SchemaQuery { board_id }.build())?;
        let board_json = &response["data"]["boards"][0];

        let name = board_json["name"].as_str().unwrap_or_default().to_string();
        let permissions = board_json["permissions"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        let groups = board_json["groups"]
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|group| {
                Some(Group {
                    id: group["id"].as_str()?.to_string(),
                    title: clean_name(group["title"].as_str()?),
                })
            })
            .collect();
        let registry = ColumnRegistry::from_schema(&response);

        Ok(Board {
            connection,
            board_id,
            name,
            permissions,
            registry,
            sub_registry: None,
            groups,
            rows: Vec::new(),
            row_multimap: RowMultimap::default(),
            row_keys: HashMap::new(),
            key_spec,
            was_altered: false,
            missing_columns: Vec::new(),
            missing_labels: Vec::new(),
        })
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn group_id(&self, name: &str) -> Option<&str> {
        self.groups
            .iter()
            .find(|group| group.title == name || group.id == name)
            .map(|group| group.id.as_str())
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row(&self, slot: usize) -> Option<&Row> {
        self.rows.get(slot)
    }

    pub fn row_mut(&mut self, slot: usize) -> Option<&mut Row> {
        self.rows.get_mut(slot)
    }

    /// Every row carrying a display name, in discovery order
    pub fn rows_named(&self, name: &str) -> Vec<&Row> {
        self.row_multimap
            .get(name)
            .iter()
            .map(|slot| &self.rows[*slot])
            .collect()
    }

    /// Resolve a row by its composite key, built from field/value pairs in
    /// the same normalized form row keys use.
    pub fn row_by_key(&self, values: &[(&str, &str)]) -> Option<&Row> {
        let key = self.key_spec.search_key(values);
        self.row_keys.get(&key).map(|slot| &self.rows[*slot])
    }

    /// Fetch rows from the remote, replacing the current row set. Key
    /// registration is all-or-nothing: a missing key field or duplicate key
    /// fails the whole selection and leaves the board unchanged.
    pub fn select(&mut self, options: &SelectOptions) -> Result<&[Row]> {
        let mut fetched = select::select(&self.connection, &self.registry, &self.groups, options)?;

        let mut keys: Vec<Option<String>> = Vec::with_capacity(fetched.len());
        if !self.key_spec.is_empty() {
            let mut seen: HashMap<String, String> = HashMap::new();
            for row in &fetched {
                let key = self.key_spec.build(row)?;
                if let Some(previous) = seen.insert(key.clone(), row.row_name.clone()) {
                    return Err(BoardError::DuplicateKey(format!(
                        "rows [{}] and [{}] share key [{}]",
                        previous, row.row_name, key
                    )));
                }
                keys.push(Some(key));
            }
        } else {
            keys.resize(fetched.len(), None);
        }

        self.rows.clear();
        self.row_multimap.clear();
        self.row_keys.clear();
        for (mut row, key) in fetched.drain(..).zip(keys) {
            row.key = key;
            self.register(row);
        }
        tracing::info!("selected {} rows from board [{}]", self.rows.len(), self.board_id);
        Ok(&self.rows)
    }

    fn register(&mut self, row: Row) -> usize {
        let slot = self.rows.len();
        self.row_multimap.insert(&row.row_name, slot);
        if let Some(key) = &row.key {
            self.row_keys.insert(key.clone(), slot);
        }
        self.rows.push(row);
        slot
    }

    /// A local row shaped after this board's schema, positioned in a group.
    /// The row exists only locally until [`Board::insert`] confirms it.
    pub fn new_row(&self, row_name: &str, group_name: &str) -> Result<Row> {
        let group = self
            .groups
            .iter()
            .find(|group| group.title == group_name || group.id == group_name)
            .ok_or_else(|| BoardError::NotFound(format!("no group [{}]", group_name)))?;

        let mut row = Row::empty(row_name, &group.id, &group.title);
        for column in self.registry.columns() {
            if column.id == "name" || column.column_type == crate::schema::ColumnType::Subitems {
                continue;
            }
            row.push_cell(Cell::empty(column));
        }
        Ok(row)
    }

    /// Create the row remotely with its modified cells as initial values,
    /// then register it locally. Returns the row's slot.
    pub fn insert(&mut self, mut row: Row) -> Result<usize> {
        let key = if self.key_spec.is_empty() {
            None
        } else {
            let key = self.key_spec.build(&row)?;
            if self.row_keys.contains_key(&key) {
                return Err(BoardError::DuplicateKey(format!(
                    "a row with key [{}] already exists",
                    key
                )));
            }
            Some(key)
        };

        let response = {
            let cells = row.modified_cells();
            let mutation = InsertMutation {
                board_id: self.board_id,
                group_id: &row.group_id,
                row_name: &row.row_name,
                cells: &cells,
            };
            self.connection.execute(&mutation.build())?
        };

        let row_id = response["data"]["create_item"]["id"]
            .as_str()
            .map(str::to_string)
            .or_else(|| response["data"]["create_item"]["id"].as_i64().map(|id| id.to_string()))
            .ok_or_else(|| {
                BoardError::Internal("insert response carried no row id".to_string())
            })?;

        tracing::debug!("created row [{}] as [{}]", row.row_name, row_id);
        row.row_id = Some(row_id);
        row.on_remote = true;
        row.key = key;
        row.clear_modified();
        Ok(self.register(row))
    }

    /// Push a row's modified cells to the remote in one request. Dirty
    /// flags clear only after the remote confirms.
    pub fn update(&mut self, slot: usize, create_missing_labels: bool) -> Result<()> {
        let row = self
            .rows
            .get(slot)
            .ok_or_else(|| BoardError::NotFound(format!("no row at slot [{}]", slot)))?;
        let row_id = row
            .row_id
            .clone()
            .ok_or_else(|| BoardError::Internal("cannot update a row with no remote id".to_string()))?;

        {
            let cells = row.modified_cells();
            if cells.is_empty() {
                tracing::debug!("row [{}] has no modified cells, skipping update", row.row_name);
                return Ok(());
            }
            let mutation = UpdateMutation {
                board_id: self.board_id,
                row_id: &row_id,
                cells: &cells,
                create_missing_labels,
            };
            self.connection.execute(&mutation.build())?;
        }

        self.rows[slot].clear_modified();
        Ok(())
    }

    /// Write the named cells of a row from display text, then push them
    pub fn update_columns(
        &mut self,
        slot: usize,
        values: &[(&str, &str)],
        create_missing_labels: bool,
    ) -> Result<()> {
        {
            let row = self
                .rows
                .get_mut(slot)
                .ok_or_else(|| BoardError::NotFound(format!("no row at slot [{}]", slot)))?;
            for (name, value) in values {
                row.set_text(name, value)?;
            }
        }
        self.update(slot, create_missing_labels)
    }

    /// Write one column from a plain string; an empty value clears the
    /// column remotely.
    pub fn update_single_column(&mut self, slot: usize, column_name: &str, value: &str) -> Result<()> {
        let row = self
            .rows
            .get(slot)
            .ok_or_else(|| BoardError::NotFound(format!("no row at slot [{}]", slot)))?;
        let row_id = row
            .row_id
            .clone()
            .ok_or_else(|| BoardError::Internal("cannot update a row with no remote id".to_string()))?;
        let column = self
            .registry
            .get(column_name)
            .ok_or_else(|| BoardError::SchemaMismatch(format!("no column [{}]", column_name)))?;

        let mutation = SingleColumnUpdate {
            board_id: self.board_id,
            row_id: &row_id,
            column_id: &column.id,
            value,
        };
        self.connection.execute(&mutation.build())?;

        let row = &mut self.rows[slot];
        if let Some(cell) = row.cell_mut(column_name) {
            if value.is_empty() {
                cell.value = None;
                cell.previous_value = None;
                cell.modified = false;
            } else {
                cell.set_text(value);
                cell.clear_modified();
            }
        }
        Ok(())
    }

    /// Delete a row remotely, then drop it from local bookkeeping
    pub fn delete(&mut self, slot: usize) -> Result<()> {
        let row = self
            .rows
            .get(slot)
            .ok_or_else(|| BoardError::NotFound(format!("no row at slot [{}]", slot)))?;
        let row_id = row
            .row_id
            .clone()
            .ok_or_else(|| BoardError::Internal("cannot delete a row with no remote id".to_string()))?;

        self.connection
            .execute(&DeleteMutation { row_id: &row_id }.build())?;

        let row = self.rows.remove(slot);
        self.row_multimap.remove_slot(&row.row_name, slot);
        self.row_multimap.shift_after(slot);
        if let Some(key) = &row.key {
            self.row_keys.remove(key);
        }
        for keyed_slot in self.row_keys.values_mut() {
            if *keyed_slot > slot {
                *keyed_slot -= 1;
            }
        }
        tracing::debug!("deleted row [{}]", row_id);
        Ok(())
    }

    /// Count of rows currently on the remote
    pub fn item_count(&self) -> Result<u64> {
        let response = self
            .connection
            .execute(&ItemCountQuery { board_id: self.board_id }.build())?;
        response["data"]["boards"][0]["items_count"]
            .as_u64()
            .ok_or_else(|| BoardError::Internal("item count response had no count".to_string()))
    }

    /// Create a group remotely and register it locally
    pub fn create_group(&mut self, group_name: &str) -> Result<String> {
        let mutation = CreateGroupMutation {
            board_id: self.board_id,
            group_name,
        };
        let response = self.connection.execute(&mutation.build())?;
        let group_id = response["data"]["create_group"]["id"]
            .as_str()
            .ok_or_else(|| BoardError::Internal("create group response had no id".to_string()))?
            .to_string();

        self.groups.push(Group {
            id: group_id.clone(),
            title: group_name.to_string(),
        });
        Ok(group_id)
    }

    /// Encoded change set of a row, exposed for callers that stage writes
    pub fn pending_changes(&self, slot: usize) -> serde_json::Map<String, serde_json::Value> {
        self.rows
            .get(slot)
            .map(|row| change_set(&row.modified_cells()))
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for Board {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Board")
            .field("board_id", &self.board_id)
            .field("name", &self.name)
            .field("columns", &self.registry.len())
            .field("rows", &self.rows.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boardsync_http::testing::ScriptedTransport;
    use boardsync_http::ApiConfig;

    fn schema_body() -> String {
        serde_json::json!({
            "data": {"boards": [{
                "id": "42",
                "name": "Sprint Board",
                "permissions": "everyone",
                "groups": [
                    {"id": "g1", "title": "Group A"},
                    {"id": "g2", "title": "Group B"}
                ],
                "items_page": {"items": []},
                "columns": [
                    {"id": "name", "title": "Name", "type": "name", "settings_str": "{}"},
                    {"id": "status", "title": "Status", "type": "status",
                     "settings_str": "{\"labels\":{\"1\":\"Done\",\"2\":\"Stuck\"}}"},
                    {"id": "text1", "title": "Team", "type": "text", "settings_str": "{}"}
                ]
            }]}
        })
        .to_string()
    }

    fn page_body(group: &str, cursor: Option<&str>, items: serde_json::Value) -> String {
        serde_json::json!({
            "data": {"boards": [{
                "groups": [{
                    "id": group,
                    "title": group,
                    "items_page": {"cursor": cursor, "items": items}
                }]
            }]}
        })
        .to_string()
    }

    fn item(id: &str, name: &str, status: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id, "name": name,
            "column_values": [
                {"id": "status", "column": {"title": "Status"}, "text": status},
                {"id": "text1", "column": {"title": "Team"}, "text": "Infra"}
            ]
        })
    }

    fn board_with(transport: Arc<ScriptedTransport>, key_spec: KeySpec) -> Board {
        transport.push(200, schema_body());
        let connection = Arc::new(Connection::with_transport(
            42,
            ApiConfig::new("https://remote.test/api", "token"),
            transport,
        ));
        Board::load(connection, key_spec).unwrap()
    }

    #[test]
    fn test_load_reads_schema_and_groups() {
        let transport = Arc::new(ScriptedTransport::default());
        let board = board_with(transport, KeySpec::default());
        assert_eq!(board.name, "Sprint Board");
        assert_eq!(board.groups().len(), 2);
        assert_eq!(board.group_id("Group B"), Some("g2"));
        assert_eq!(board.registry.len(), 3);
    }

    #[test]
    fn test_select_pages_until_null_cursor() {
        let transport = Arc::new(ScriptedTransport::default());
        let mut board = board_with(transport.clone(), KeySpec::default());

        // group A: two pages; group B: one page
        transport.push(
            200,
            page_body("g1", Some("next"), serde_json::json!([item("1", "Task A", "Done")])),
        );
        transport.push(
            200,
            page_body("g1", None, serde_json::json!([item("2", "Task B", "Stuck")])),
        );
        transport.push(
            200,
            page_body("g2", None, serde_json::json!([item("3", "Task C", "Done")])),
        );

        let rows = board.select(&SelectOptions::all()).unwrap();
        assert_eq!(rows.len(), 3);
        // schema probe + three pages
        assert_eq!(transport.call_count(), 4);
    }

    #[test]
    fn test_select_registers_keys_and_finds_rows() {
        let transport = Arc::new(ScriptedTransport::default());
        let mut board = board_with(
            transport.clone(),
            KeySpec::new(["Group Name", "Row Name"]),
        );
        transport.push(
            200,
            page_body("g1", None, serde_json::json!([item("1", "Task A", "Done")])),
        );
        transport.push(200, page_body("g2", None, serde_json::json!([])));

        board.select(&SelectOptions::all()).unwrap();
        let found = board
            .row_by_key(&[("Group Name", "Group A"), ("Row Name", "Task A")])
            .unwrap();
        assert_eq!(found.row_id.as_deref(), Some("1"));
        assert_eq!(board.rows_named("Task A").len(), 1);
    }

    #[test]
    fn test_select_duplicate_key_aborts_without_mutation() {
        let transport = Arc::new(ScriptedTransport::default());
        let mut board = board_with(transport.clone(), KeySpec::new(["Row Name"]));
        transport.push(
            200,
            page_body(
                "g1",
                None,
                serde_json::json!([item("1", "Task A", "Done"), item("2", "Task A", "Stuck")]),
            ),
        );
        transport.push(200, page_body("g2", None, serde_json::json!([])));

        let err = board.select(&SelectOptions::all()).unwrap_err();
        assert!(matches!(err, BoardError::DuplicateKey(_)));
        assert!(board.rows().is_empty());
    }

    #[test]
    fn test_insert_assigns_remote_id_and_clears_dirty() {
        let transport = Arc::new(ScriptedTransport::default());
        let mut board = board_with(transport.clone(), KeySpec::default());

        let mut row = board.new_row("Task X", "Group A").unwrap();
        row.set_text("Status", "Done").unwrap();
        transport.push(
            200,
            serde_json::json!({"data": {"create_item": {"id": "901"}}}).to_string(),
        );

        let slot = board.insert(row).unwrap();
        let row = board.row(slot).unwrap();
        assert_eq!(row.row_id.as_deref(), Some("901"));
        assert!(row.on_remote);
        assert!(!row.is_modified());

        let payload = &transport.payloads()[1];
        let text = payload["query"].as_str().unwrap();
        assert!(text.contains("create_item"));
        assert!(text.contains(r#"group_id: "g1""#));
    }

    #[test]
    fn test_update_skips_when_clean_and_clears_after_confirm() {
        let transport = Arc::new(ScriptedTransport::default());
        let mut board = board_with(transport.clone(), KeySpec::default());
        transport.push(
            200,
            page_body("g1", None, serde_json::json!([item("1", "Task A", "Done")])),
        );
        transport.push(200, page_body("g2", None, serde_json::json!([])));
        board.select(&SelectOptions::all()).unwrap();

        // nothing dirty, no request goes out
        board.update(0, false).unwrap();
        assert_eq!(transport.call_count(), 3);

        board.row_mut(0).unwrap().set_text("Status", "Stuck").unwrap();
        transport.push(
            200,
            serde_json::json!({"data": {"change_multiple_column_values": {"id": "1"}}}).to_string(),
        );
        board.update(0, false).unwrap();
        assert_eq!(transport.call_count(), 4);
        assert!(!board.row(0).unwrap().is_modified());
    }

    #[test]
    fn test_update_failure_keeps_cells_dirty() {
        let transport = Arc::new(ScriptedTransport::default());
        let mut board = board_with(transport.clone(), KeySpec::default());
        transport.push(
            200,
            page_body("g1", None, serde_json::json!([item("1", "Task A", "Done")])),
        );
        transport.push(200, page_body("g2", None, serde_json::json!([])));
        board.select(&SelectOptions::all()).unwrap();

        board.row_mut(0).unwrap().set_text("Status", "Stuck").unwrap();
        transport.push(504, String::new());

        assert!(board.update(0, false).is_err());
        assert!(board.row(0).unwrap().is_modified());
    }

    #[test]
    fn test_delete_removes_local_row_after_confirm() {
        let transport = Arc::new(ScriptedTransport::default());
        let mut board = board_with(transport.clone(), KeySpec::new(["Row Name"]));
        transport.push(
            200,
            page_body(
                "g1",
                None,
                serde_json::json!([item("1", "Task A", "Done"), item("2", "Task B", "Stuck")]),
            ),
        );
        transport.push(200, page_body("g2", None, serde_json::json!([])));
        board.select(&SelectOptions::all()).unwrap();

        transport.push(
            200,
            serde_json::json!({"data": {"delete_item": {"id": "1"}}}).to_string(),
        );
        board.delete(0).unwrap();

        assert_eq!(board.rows().len(), 1);
        assert!(board.rows_named("Task A").is_empty());
        // the surviving row's key still resolves after the slot shift
        assert_eq!(
            board.row_by_key(&[("Row Name", "Task B")]).unwrap().row_id.as_deref(),
            Some("2")
        );
    }

    #[test]
    fn test_item_count_and_create_group() {
        let transport = Arc::new(ScriptedTransport::default());
        let mut board = board_with(transport.clone(), KeySpec::default());

        transport.push(
            200,
            serde_json::json!({"data": {"boards": [{"items_count": 17}]}}).to_string(),
        );
        assert_eq!(board.item_count().unwrap(), 17);

        transport.push(
            200,
            serde_json::json!({"data": {"create_group": {"id": "g3"}}}).to_string(),
        );
        let group_id = board.create_group("Group C").unwrap();
        assert_eq!(group_id, "g3");
        assert_eq!(board.group_id("Group C"), Some("g3"));
    }

    #[test]
    fn test_update_single_column_clears_on_empty() {
        let transport = Arc::new(ScriptedTransport::default());
        let mut board = board_with(transport.clone(), KeySpec::default());
        transport.push(
            200,
            page_body("g1", None, serde_json::json!([item("1", "Task A", "Done")])),
        );
        transport.push(200, page_body("g2", None, serde_json::json!([])));
        board.select(&SelectOptions::all()).unwrap();

        transport.push(
            200,
            serde_json::json!({"data": {"change_simple_column_value": {"id": "1"}}}).to_string(),
        );
        board.update_single_column(0, "Team", "").unwrap();
        assert!(!board.row(0).unwrap().cell("Team").unwrap().is_set());
    }
}
