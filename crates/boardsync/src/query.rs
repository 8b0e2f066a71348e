//! Structured request builders
//!
//! Every remote operation has a builder that renders the request text and
//! wraps it as a `{"query": ...}` payload for the connection layer. Builders
//! own all text assembly so the rest of the crate never concatenates
//! request fragments.

use crate::cell::Cell;
use crate::value::CellValue;

/// Page size cap enforced by the remote
pub const PAGE_LIMIT: usize = 100;
/// Maximum ids per by-id read
pub const ID_CHUNK: usize = 100;

/// Escape a value for embedding inside a quoted request argument
pub fn quote(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Collapse request text to a single line, the form the remote logs best
fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn payload(text: String) -> serde_json::Value {
    serde_json::json!({ "query": collapse(&text) })
}

fn id_list(ids: &[String]) -> String {
    let quoted: Vec<String> = ids.iter().map(|id| format!("\"{}\"", quote(id))).collect();
    format!("[{}]", quoted.join(", "))
}

/// Schema probe: board metadata, groups, column definitions, and a single
/// sample row used to learn the remote's current column set.
pub struct SchemaQuery {
    pub board_id: i64,
}

impl SchemaQuery {
    pub fn build(&self) -> serde_json::Value {
        payload(format!(
            r#"query {{
                boards (ids: {board_id}) {{
                    id name permissions
                    groups {{ id title }}
                    items_page (limit: 1) {{
                        items {{ name id column_values {{ id column {{ title }} text }} }}
                    }}
                    columns {{ id title type settings_str }}
                }}
            }}"#,
            board_id = self.board_id
        ))
    }
}

/// Count of rows currently on the board
pub struct ItemCountQuery {
    pub board_id: i64,
}

impl ItemCountQuery {
    pub fn build(&self) -> serde_json::Value {
        payload(format!(
            "query {{ boards (ids: {}) {{ items_count }} }}",
            self.board_id
        ))
    }
}

/// One page of rows from a single group, driven by an opaque cursor
pub struct GroupPageQuery<'a> {
    pub board_id: i64,
    pub group_id: &'a str,
    pub cursor: Option<&'a str>,
    pub limit: usize,
    /// Column ids to fetch; empty means all columns
    pub field_ids: &'a [String],
}

impl GroupPageQuery<'_> {
    pub fn build(&self) -> serde_json::Value {
        let cursor = match self.cursor {
            Some(cursor) => format!("cursor: \"{}\", ", quote(cursor)),
            None => String::new(),
        };
        let view = if self.field_ids.is_empty() {
            "column_values".to_string()
        } else {
            format!("column_values (ids: {})", id_list(self.field_ids))
        };
        payload(format!(
            r#"{{
                boards (ids: {board_id}) {{
                    groups (ids: "{group_id}") {{
                        id title
                        items_page ({cursor}limit: {limit}) {{
                            cursor
                            items {{ id name {view} {{ id column {{ title }} text }} }}
                        }}
                    }}
                }}
            }}"#,
            board_id = self.board_id,
            group_id = quote(self.group_id),
            cursor = cursor,
            limit = self.limit.min(PAGE_LIMIT),
        ))
    }
}

/// One page of rows matched server-side against a column's values
pub struct ColumnValuePageQuery<'a> {
    pub board_id: i64,
    pub column_id: &'a str,
    pub values: &'a [String],
    pub cursor: Option<&'a str>,
    pub limit: usize,
    pub field_ids: &'a [String],
}

impl ColumnValuePageQuery<'_> {
    pub fn build(&self) -> serde_json::Value {
        let cursor = match self.cursor {
            Some(cursor) => format!("cursor: \"{}\", ", quote(cursor)),
            None => String::new(),
        };
        let view = if self.field_ids.is_empty() {
            "column_values".to_string()
        } else {
            format!("column_values (ids: {})", id_list(self.field_ids))
        };
        payload(format!(
            r#"{{
                items_page_by_column_values (
                    {cursor}board_id: {board_id},
                    columns: [{{ column_id: "{column_id}", column_values: {values} }}],
                    limit: {limit})
                {{
                    cursor
                    items {{ id name group {{ id title }} {view} {{ id column {{ title }} text }} }}
                }}
            }}"#,
            cursor = cursor,
            board_id = self.board_id,
            column_id = quote(self.column_id),
            values = id_list(self.values),
            limit = self.limit.min(PAGE_LIMIT),
        ))
    }
}

/// Full rows by id, used for sub-row hydration. Callers chunk id lists at
/// [`ID_CHUNK`] through [`ItemsByIdsQuery::chunks`].
pub struct ItemsByIdsQuery<'a> {
    pub ids: &'a [String],
}

impl<'a> ItemsByIdsQuery<'a> {
    pub fn chunks(ids: &'a [String]) -> impl Iterator<Item = ItemsByIdsQuery<'a>> {
        ids.chunks(ID_CHUNK).map(|ids| ItemsByIdsQuery { ids })
    }

    pub fn build(&self) -> serde_json::Value {
        payload(format!(
            r#"query {{
                items (ids: {ids}) {{
                    name id board {{ id }}
                    column_values {{ id column {{ title }} value text type }}
                }}
            }}"#,
            ids = id_list(self.ids)
        ))
    }
}

/// Raw value of a row's sub-row reference cell, which carries the child ids
pub struct SubitemIdsQuery<'a> {
    pub row_id: &'a str,
    pub sub_column_id: &'a str,
}

impl SubitemIdsQuery<'_> {
    pub fn build(&self) -> serde_json::Value {
        payload(format!(
            r#"query {{
                items (ids: {row_id}) {{
                    column_values (ids: ["{sub_id}"]) {{ value }}
                }}
            }}"#,
            row_id = self.row_id,
            sub_id = quote(self.sub_column_id)
        ))
    }
}

/// Column-id → encoded value map for the modified, value-carrying cells of
/// a row. This is the only write shape the mutations accept.
pub fn change_set(cells: &[&Cell]) -> serde_json::Map<String, serde_json::Value> {
    let mut map = serde_json::Map::new();
    for cell in cells {
        if !cell.modified {
            continue;
        }
        let Some(value) = &cell.value else { continue };
        // the encoder only consults the column for the link-text fallback
        let column = crate::schema::Column::new(0, &cell.id, &cell.name, cell.column_type);
        map.insert(cell.id.clone(), value.encode(&column));
    }
    map
}

fn change_set_arg(cells: &[&Cell]) -> String {
    let map = change_set(cells);
    quote(&serde_json::Value::Object(map).to_string())
}

/// Create a row in a group, with the row's modified cells as initial values
pub struct InsertMutation<'a> {
    pub board_id: i64,
    pub group_id: &'a str,
    pub row_name: &'a str,
    pub cells: &'a [&'a Cell],
}

impl InsertMutation<'_> {
    pub fn build(&self) -> serde_json::Value {
        payload(format!(
            r#"mutation {{
                create_item (
                    board_id: {board_id},
                    group_id: "{group_id}",
                    item_name: "{row_name}",
                    column_values: "{values}")
                {{ id name column_values {{ id column {{ title }} text type }} }}
            }}"#,
            board_id = self.board_id,
            group_id = quote(self.group_id),
            row_name = quote(self.row_name),
            values = change_set_arg(self.cells),
        ))
    }
}

/// Create a child row under a parent; the response names the sub-board
pub struct SubitemInsertMutation<'a> {
    pub parent_row_id: &'a str,
    pub row_name: &'a str,
    pub cells: &'a [&'a Cell],
}

impl SubitemInsertMutation<'_> {
    pub fn build(&self) -> serde_json::Value {
        payload(format!(
            r#"mutation {{
                create_subitem (
                    parent_item_id: {parent_id},
                    item_name: "{row_name}",
                    column_values: "{values}")
                {{ id board {{ id }} name column_values {{ id column {{ title }} text type }} }}
            }}"#,
            parent_id = self.parent_row_id,
            row_name = quote(self.row_name),
            values = change_set_arg(self.cells),
        ))
    }
}

/// Write a row's modified cells in one request
pub struct UpdateMutation<'a> {
    pub board_id: i64,
    pub row_id: &'a str,
    pub cells: &'a [&'a Cell],
    /// Ask the remote to create labels the change set references but the
    /// column does not yet define
    pub create_missing_labels: bool,
}

impl UpdateMutation<'_> {
    pub fn build(&self) -> serde_json::Value {
        let labels = if self.create_missing_labels {
            ", create_labels_if_missing: true"
        } else {
            ""
        };
        payload(format!(
            r#"mutation {{
                change_multiple_column_values (
                    item_id: {row_id},
                    board_id: {board_id},
                    column_values: "{values}"{labels})
                {{ id }}
            }}"#,
            row_id = self.row_id,
            board_id = self.board_id,
            values = change_set_arg(self.cells),
            labels = labels,
        ))
    }
}

/// Write one column of a row from a plain string value
pub struct SingleColumnUpdate<'a> {
    pub board_id: i64,
    pub row_id: &'a str,
    pub column_id: &'a str,
    /// Empty clears the column remotely
    pub value: &'a str,
}

impl SingleColumnUpdate<'_> {
    pub fn build(&self) -> serde_json::Value {
        payload(format!(
            r#"mutation {{
                change_simple_column_value (
                    item_id: {row_id},
                    board_id: {board_id},
                    column_id: "{column_id}",
                    value: "{value}")
                {{ id }}
            }}"#,
            row_id = self.row_id,
            board_id = self.board_id,
            column_id = quote(self.column_id),
            value = quote(self.value),
        ))
    }
}

/// Remove a row by id
pub struct DeleteMutation<'a> {
    pub row_id: &'a str,
}

impl DeleteMutation<'_> {
    pub fn build(&self) -> serde_json::Value {
        payload(format!(
            "mutation {{ delete_item (item_id: {}) {{ id }} }}",
            self.row_id
        ))
    }
}

/// Create a group on the board
pub struct CreateGroupMutation<'a> {
    pub board_id: i64,
    pub group_name: &'a str,
}

impl CreateGroupMutation<'_> {
    pub fn build(&self) -> serde_json::Value {
        payload(format!(
            r#"mutation {{ create_group (board_id: "{}", group_name: "{}") {{ id }} }}"#,
            self.board_id,
            quote(self.group_name)
        ))
    }
}

/// Ordered comparison for client-side filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Lt,
    Gt,
    Le,
    Ge,
}

impl CmpOp {
    fn holds(&self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            CmpOp::Eq => ordering == Equal,
            CmpOp::Lt => ordering == Less,
            CmpOp::Gt => ordering == Greater,
            CmpOp::Le => ordering != Greater,
            CmpOp::Ge => ordering != Less,
        }
    }
}

/// Client-side row filter over one column. Without an operator the filter
/// is a membership test against `values`.
#[derive(Debug, Clone)]
pub struct RowFilter {
    pub column: String,
    pub op: Option<CmpOp>,
    pub values: Vec<String>,
}

impl RowFilter {
    pub fn membership(column: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            column: column.into(),
            op: None,
            values,
        }
    }

    pub fn compare(column: impl Into<String>, op: CmpOp, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            op: Some(op),
            values: vec![value.into()],
        }
    }

    /// Whether a row's cell value passes this filter. Temporal values
    /// compare as timestamps, everything else as display text. A row
    /// without the column, or with it unset, never matches.
    pub fn matches(&self, row: &crate::row::Row) -> bool {
        let Some(cell) = row.cell(&self.column) else {
            return false;
        };
        let Some(value) = &cell.value else {
            return false;
        };
        self.value_passes(value, cell.column_type)
    }

    /// The same test against a raw item payload, so pages can be narrowed
    /// before any rows are built. `Name` reads the item's name field; other
    /// columns resolve through the registry.
    pub fn matches_item(
        &self,
        registry: &crate::schema::ColumnRegistry,
        item: &serde_json::Value,
    ) -> bool {
        if self.column == "Name" {
            let name = item["name"].as_str().unwrap_or_default();
            if name.is_empty() {
                return false;
            }
            return self.value_passes(
                &CellValue::Text(name.to_string()),
                crate::schema::ColumnType::Text,
            );
        }
        let Some(column) = registry.get(&self.column) else {
            return false;
        };
        let text = item["column_values"]
            .as_array()
            .into_iter()
            .flatten()
            .find(|entry| entry["id"].as_str() == Some(column.id.as_str()))
            .and_then(|entry| entry["text"].as_str())
            .unwrap_or_default();
        if text.is_empty() {
            return false;
        }
        self.value_passes(
            &CellValue::parse(column.column_type, text),
            column.column_type,
        )
    }

    fn value_passes(&self, value: &CellValue, column_type: crate::schema::ColumnType) -> bool {
        let display = value.to_display();
        match self.op {
            None => self.values.iter().any(|candidate| *candidate == display),
            Some(op) => self.values.iter().any(|candidate| {
                let ordering = match value.timestamp() {
                    Some(left) => {
                        let right = CellValue::parse(column_type, candidate)
                            .timestamp()
                            .unwrap_or(0);
                        left.cmp(&right)
                    }
                    None => display.as_str().cmp(candidate.as_str()),
                };
                op.holds(ordering)
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Cell;
    use crate::row::Row;
    use crate::schema::{Column, ColumnType};

    fn query_text(payload: &serde_json::Value) -> String {
        payload["query"].as_str().unwrap().to_string()
    }

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote(r#"a "b" \c"#), r#"a \"b\" \\c"#);
    }

    #[test]
    fn test_schema_query_shape() {
        let text = query_text(&SchemaQuery { board_id: 42 }.build());
        assert!(text.contains("boards (ids: 42)"));
        assert!(text.contains("items_page (limit: 1)"));
        assert!(text.contains("columns { id title type settings_str }"));
    }

    #[test]
    fn test_group_page_limit_is_capped() {
        let query = GroupPageQuery {
            board_id: 42,
            group_id: "g1",
            cursor: None,
            limit: 5000,
            field_ids: &[],
        };
        let text = query_text(&query.build());
        assert!(text.contains("limit: 100"));
        assert!(!text.contains("cursor: \""));
    }

    #[test]
    fn test_group_page_carries_cursor_and_fields() {
        let fields = vec!["status".to_string(), "text1".to_string()];
        let query = GroupPageQuery {
            board_id: 42,
            group_id: "g1",
            cursor: Some("abc123"),
            limit: 50,
            field_ids: &fields,
        };
        let text = query_text(&query.build());
        assert!(text.contains(r#"cursor: "abc123""#));
        assert!(text.contains(r#"column_values (ids: ["status", "text1"])"#));
        assert!(text.contains("limit: 50"));
    }

    #[test]
    fn test_column_value_page_shape() {
        let values = vec!["Done".to_string(), "Stuck".to_string()];
        let query = ColumnValuePageQuery {
            board_id: 42,
            column_id: "status",
            values: &values,
            cursor: None,
            limit: 100,
            field_ids: &[],
        };
        let text = query_text(&query.build());
        assert!(text.contains("items_page_by_column_values"));
        assert!(text.contains(r#"column_id: "status""#));
        assert!(text.contains(r#"column_values: ["Done", "Stuck"]"#));
    }

    #[test]
    fn test_items_by_ids_chunking() {
        let ids: Vec<String> = (0..230).map(|i| i.to_string()).collect();
        let sizes: Vec<usize> = ItemsByIdsQuery::chunks(&ids)
            .map(|query| query.ids.len())
            .collect();
        assert_eq!(sizes, vec![100, 100, 30]);
    }

    #[test]
    fn test_change_set_skips_clean_and_unset_cells() {
        let mut dirty = Cell::empty(&Column::new(0, "text1", "Team", ColumnType::Text));
        dirty.set_text("Infra");
        let clean = Cell::hydrated(&Column::new(1, "text2", "Owner", ColumnType::Text), "pat");
        let unset = Cell::empty(&Column::new(2, "text3", "Notes", ColumnType::Text));

        let cells: Vec<&Cell> = vec![&dirty, &clean, &unset];
        let set = change_set(&cells);
        assert_eq!(set.len(), 1);
        assert_eq!(set["text1"], serde_json::json!("Infra"));
    }

    #[test]
    fn test_change_set_structured_encodings() {
        let mut check = Cell::empty(&Column::new(0, "check", "Active", ColumnType::Checkbox));
        check.set_text("v");
        let mut due = Cell::empty(&Column::new(1, "date4", "Due", ColumnType::Date));
        due.set_text("2024-03-01");

        let cells: Vec<&Cell> = vec![&check, &due];
        let set = change_set(&cells);
        assert_eq!(set["check"], serde_json::json!({"checked": "true"}));
        assert_eq!(set["date4"], serde_json::json!({"date": "2024-03-01"}));
    }

    #[test]
    fn test_update_mutation_embeds_escaped_change_set() {
        let mut cell = Cell::empty(&Column::new(0, "text1", "Team", ColumnType::Text));
        cell.set_text("Infra");
        let cells: Vec<&Cell> = vec![&cell];
        let text = query_text(
            &UpdateMutation {
                board_id: 42,
                row_id: "777",
                cells: &cells,
                create_missing_labels: false,
            }
            .build(),
        );
        assert!(text.contains("change_multiple_column_values"));
        assert!(text.contains("item_id: 777"));
        assert!(text.contains(r#"column_values: "{\"text1\":\"Infra\"}""#));
        assert!(!text.contains("create_labels_if_missing"));
    }

    #[test]
    fn test_update_mutation_with_missing_labels() {
        let cells: Vec<&Cell> = vec![];
        let text = query_text(
            &UpdateMutation {
                board_id: 42,
                row_id: "777",
                cells: &cells,
                create_missing_labels: true,
            }
            .build(),
        );
        assert!(text.contains("create_labels_if_missing: true"));
    }

    #[test]
    fn test_insert_and_delete_shapes() {
        let cells: Vec<&Cell> = vec![];
        let insert = query_text(
            &InsertMutation {
                board_id: 42,
                group_id: "g1",
                row_name: "Task A",
                cells: &cells,
            }
            .build(),
        );
        assert!(insert.contains("create_item"));
        assert!(insert.contains(r#"item_name: "Task A""#));

        let delete = query_text(&DeleteMutation { row_id: "777" }.build());
        assert_eq!(delete, "mutation { delete_item (item_id: 777) { id } }");
    }

    fn filter_row(status: &str, due: &str) -> Row {
        let mut row = Row::empty("Task", "g1", "Sprint");
        let mut status_col = Column::new(1, "status", "Status", ColumnType::Status);
        status_col.labels = vec!["Done".to_string(), "Stuck".to_string()];
        row.push_cell(Cell::hydrated(&status_col, status));
        row.push_cell(Cell::hydrated(
            &Column::new(2, "date4", "Due", ColumnType::Date),
            due,
        ));
        row
    }

    #[test]
    fn test_membership_filter() {
        let filter = RowFilter::membership("Status", vec!["Done".to_string()]);
        assert!(filter.matches(&filter_row("Done", "2024-03-01")));
        assert!(!filter.matches(&filter_row("Stuck", "2024-03-01")));
    }

    #[test]
    fn test_date_comparison_uses_timestamps() {
        let filter = RowFilter::compare("Due", CmpOp::Lt, "2024-06-01");
        assert!(filter.matches(&filter_row("Done", "2024-03-01")));
        assert!(!filter.matches(&filter_row("Done", "2024-07-01")));

        let at_least = RowFilter::compare("Due", CmpOp::Ge, "2024-03-01");
        assert!(at_least.matches(&filter_row("Done", "2024-03-01")));
    }

    #[test]
    fn test_unset_or_absent_cell_never_matches() {
        let filter = RowFilter::membership("Owner", vec!["pat".to_string()]);
        assert!(!filter.matches(&filter_row("Done", "2024-03-01")));

        let unset = RowFilter::membership("Due", vec!["2024-03-01".to_string()]);
        assert!(!unset.matches(&filter_row("Done", "")));
    }

    #[test]
    fn test_filter_matches_raw_item() {
        let registry = crate::schema::ColumnRegistry::from_columns([
            Column::new(0, "status", "Status", ColumnType::Status),
            Column::new(1, "date4", "Due", ColumnType::Date),
        ]);
        let item = serde_json::json!({
            "id": "101",
            "name": "Task A",
            "column_values": [
                {"id": "status", "column": {"title": "Status"}, "text": "Done"},
                {"id": "date4", "column": {"title": "Due"}, "text": "2024-03-01"}
            ]
        });

        let filter = RowFilter::membership("Status", vec!["Done".to_string()]);
        assert!(filter.matches_item(&registry, &item));
        let filter = RowFilter::membership("Status", vec!["Stuck".to_string()]);
        assert!(!filter.matches_item(&registry, &item));

        // temporal comparison works on raw text too
        let before = RowFilter::compare("Due", CmpOp::Lt, "2024-06-01");
        assert!(before.matches_item(&registry, &item));
        let after = RowFilter::compare("Due", CmpOp::Gt, "2024-06-01");
        assert!(!after.matches_item(&registry, &item));

        // the name pseudo-column reads the item's name field
        let by_name = RowFilter::compare("Name", CmpOp::Eq, "Task A");
        assert!(by_name.matches_item(&registry, &item));

        // unknown columns and empty text never match
        let unknown = RowFilter::membership("Owner", vec!["pat".to_string()]);
        assert!(!unknown.matches_item(&registry, &item));
        let blank = serde_json::json!({
            "name": "Task B",
            "column_values": [{"id": "status", "text": ""}]
        });
        let filter = RowFilter::membership("Status", vec!["Done".to_string()]);
        assert!(!filter.matches_item(&registry, &blank));
    }
}
