//! Row selection: pagination, rehydration, and filter strategy
//!
//! Two fetch strategies exist. Group paging walks each group with an opaque
//! cursor until the remote reports the end; it is the default and the only
//! strategy that supports client-side filter operators. The column-value
//! strategy pushes a membership filter to the remote in a single paged
//! query, and is chosen only when the filter cannot name a group, targets a
//! real column, and has no operator.

use crate::board::Group;
use crate::cell::Cell;
use crate::query::{CmpOp, ColumnValuePageQuery, GroupPageQuery, RowFilter, PAGE_LIMIT};
use crate::row::Row;
use crate::schema::ColumnRegistry;
use crate::subitem::SUB_COLUMN_IDS;
use boardsync_common::{BoardError, Result};
use boardsync_http::Connection;

/// What to fetch and how to narrow it
#[derive(Debug, Clone)]
pub struct SelectOptions {
    /// Group display names; empty means every group
    pub groups: Vec<String>,
    /// Column display names to hydrate; empty or `*` means all
    pub fields: Vec<String>,
    pub filter: Option<RowFilter>,
    pub limit: usize,
}

impl Default for SelectOptions {
    fn default() -> Self {
        Self {
            groups: Vec::new(),
            fields: Vec::new(),
            filter: None,
            limit: PAGE_LIMIT,
        }
    }
}

impl SelectOptions {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn in_groups(mut self, groups: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.groups = groups.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_fields(mut self, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_filter(mut self, filter: RowFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// The remote can evaluate the filter itself only when no groups narrow
    /// the fetch, the filter targets a real column, and it is a plain
    /// membership test.
    pub fn server_filtered(&self) -> bool {
        match &self.filter {
            Some(filter) => {
                self.groups.is_empty() && filter.column != "name" && filter.op.is_none()
            }
            None => false,
        }
    }
}

/// Run a selection over the remote and hydrate the matching rows
pub fn select(
    connection: &Connection,
    registry: &ColumnRegistry,
    groups: &[Group],
    options: &SelectOptions,
) -> Result<Vec<Row>> {
    let field_ids = field_ids_for(registry, &options.fields);

    if options.server_filtered() {
        let filter = options.filter.as_ref().unwrap();
        let column_id = registry
            .get(&filter.column)
            .map(|column| column.id.clone())
            .ok_or_else(|| {
                BoardError::SchemaMismatch(format!("no column [{}] to filter on", filter.column))
            })?;
        return fetch_by_column_values(
            connection,
            registry,
            &column_id,
            &filter.values,
            &field_ids,
            options.limit,
        );
    }

    let filter = options.filter.as_ref().map(normalize_name_filter);
    let targets = resolve_groups(groups, &options.groups)?;
    let mut rows = Vec::new();
    for group in targets {
        rows.extend(fetch_group_rows(
            connection,
            registry,
            &group.id,
            &group.title,
            &field_ids,
            options.limit,
            filter.as_ref(),
        )?);
    }
    Ok(rows)
}

// A name filter without an operator means exact match, not membership over
// an arbitrary column, since the name pseudo-column always exists.
fn normalize_name_filter(filter: &RowFilter) -> RowFilter {
    let mut filter = filter.clone();
    if filter.column == "name" {
        filter.column = "Name".to_string();
        if filter.op.is_none() {
            filter.op = Some(CmpOp::Eq);
        }
    }
    filter
}

fn resolve_groups<'a>(groups: &'a [Group], wanted: &[String]) -> Result<Vec<&'a Group>> {
    if wanted.is_empty() {
        return Ok(groups.iter().collect());
    }
    wanted
        .iter()
        .map(|name| {
            groups
                .iter()
                .find(|group| group.title == *name || group.id == *name)
                .ok_or_else(|| BoardError::NotFound(format!("no group [{}]", name)))
        })
        .collect()
}

fn field_ids_for(registry: &ColumnRegistry, fields: &[String]) -> Vec<String> {
    if fields.is_empty() || fields.iter().any(|field| field == "*") {
        return Vec::new();
    }
    registry.field_ids(fields)
}

/// Page through one group until the remote returns a null cursor or an
/// empty page. A filter narrows each page's items before any rows are
/// built, so discarded items are never hydrated.
pub fn fetch_group_rows(
    connection: &Connection,
    registry: &ColumnRegistry,
    group_id: &str,
    group_name: &str,
    field_ids: &[String],
    limit: usize,
    filter: Option<&RowFilter>,
) -> Result<Vec<Row>> {
    let mut rows = Vec::new();
    let mut cursor: Option<String> = None;
    let mut page = 0u32;

    loop {
        let query = GroupPageQuery {
            board_id: connection.board_id(),
            group_id,
            cursor: cursor.as_deref(),
            limit,
            field_ids,
        };
        let response = connection.execute(&query.build())?;
        let items_page = &response["data"]["boards"][0]["groups"][0]["items_page"];
        let mut items = items_page["items"].as_array().cloned().unwrap_or_default();
        let empty = items.is_empty();

        if let Some(filter) = filter {
            items.retain(|item| filter.matches_item(registry, item));
        }
        rows.extend(rows_from_items(
            registry,
            &items,
            Some((group_id, group_name)),
        ));
        page += 1;
        tracing::debug!(
            "group [{}] page {} fetched, {} rows so far",
            group_id,
            page,
            rows.len()
        );

        cursor = items_page["cursor"].as_str().map(str::to_string);
        if cursor.is_none() || empty {
            break;
        }
    }
    Ok(rows)
}

/// Single server-side column-value selection, paged by cursor
pub fn fetch_by_column_values(
    connection: &Connection,
    registry: &ColumnRegistry,
    column_id: &str,
    values: &[String],
    field_ids: &[String],
    limit: usize,
) -> Result<Vec<Row>> {
    let mut rows = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
        let query = ColumnValuePageQuery {
            board_id: connection.board_id(),
            column_id,
            values,
            cursor: cursor.as_deref(),
            limit,
            field_ids,
        };
        let response = connection.execute(&query.build())?;
        let items_page = &response["data"]["items_page_by_column_values"];
        let items = items_page["items"].as_array().cloned().unwrap_or_default();
        let empty = items.is_empty();

        rows.extend(rows_from_items(registry, &items, None));
        cursor = items_page["cursor"].as_str().map(str::to_string);
        if cursor.is_none() || empty {
            break;
        }
    }
    Ok(rows)
}

/// Hydrate rows from the remote's item list. Each row gets the synthetic
/// name cell first, then one cell per reported column value, resolved
/// through the registry's id index; values for columns the registry does
/// not know are skipped.
pub fn rows_from_items(
    registry: &ColumnRegistry,
    items: &[serde_json::Value],
    fallback_group: Option<(&str, &str)>,
) -> Vec<Row> {
    let mut rows = Vec::new();
    for item in items {
        let row_name = item["name"].as_str().unwrap_or_default();
        let (group_id, group_name) = match (item["group"]["id"].as_str(), fallback_group) {
            (Some(id), _) => (
                id.to_string(),
                item["group"]["title"].as_str().unwrap_or_default().to_string(),
            ),
            (None, Some((id, name))) => (id.to_string(), name.to_string()),
            (None, None) => (String::new(), String::new()),
        };

        let mut row = Row::empty(row_name, &group_id, &group_name);
        row.row_id = item["id"].as_str().map(str::to_string);
        row.on_remote = true;

        for entry in item["column_values"].as_array().into_iter().flatten() {
            let Some(column_id) = entry["id"].as_str() else {
                continue;
            };
            let Some(column) = registry.get_by_id(column_id) else {
                continue;
            };
            if SUB_COLUMN_IDS.contains(&column_id) {
                row.sub_column_id = Some(column_id.to_string());
                continue;
            }
            let text = entry["text"].as_str().unwrap_or_default();
            row.push_cell(Cell::hydrated(column, text));
        }
        rows.push(row);
    }
    rows
}
