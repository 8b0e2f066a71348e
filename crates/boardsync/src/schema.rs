//! Column schema registry
//!
//! Columns are created once per board load and immutable afterwards, except
//! for the deterministic rename applied to duplicate display names during
//! construction. Rows report the column's stable id, not its display name,
//! so a secondary id index is kept for rehydration.

use std::collections::HashMap;

/// Value type of a column, as declared by the remote schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Number,
    Date,
    DateTime,
    Checkbox,
    Status,
    Dropdown,
    Person,
    Link,
    File,
    /// Reference cell linking a parent row to its sub-rows
    Subitems,
    Unknown,
}

impl ColumnType {
    /// Map the remote's type string onto the local taxonomy
    pub fn from_remote(raw: &str) -> Self {
        match raw {
            "text" | "name" | "long_text" => ColumnType::Text,
            "number" | "numbers" => ColumnType::Number,
            "date" => ColumnType::Date,
            "datetime" => ColumnType::DateTime,
            "boolean" | "checkbox" => ColumnType::Checkbox,
            "status" => ColumnType::Status,
            "dropdown" => ColumnType::Dropdown,
            "person" | "people" => ColumnType::Person,
            "link" => ColumnType::Link,
            "file" => ColumnType::File,
            "subtasks" | "subitems" => ColumnType::Subitems,
            _ => ColumnType::Unknown,
        }
    }

    /// Types whose values must be members of the column's label set
    pub fn is_label_bearing(&self) -> bool {
        matches!(self, ColumnType::Status | ColumnType::Dropdown)
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, ColumnType::Date | ColumnType::DateTime)
    }
}

/// One remote field definition
#[derive(Debug, Clone)]
pub struct Column {
    /// Display order, left to right
    pub index: usize,
    /// Stable remote identifier (needed for every write)
    pub id: String,
    /// Display name as the remote sent it
    pub title: String,
    /// Display name after duplicate resolution; unique within a registry
    pub name: String,
    pub column_type: ColumnType,
    /// Valid enumerated values, only for label-bearing types
    pub labels: Vec<String>,
    /// Label → remote label id
    pub label_map: HashMap<String, i64>,
}

impl Column {
    pub fn new(
        index: usize,
        id: impl Into<String>,
        name: impl Into<String>,
        column_type: ColumnType,
    ) -> Self {
        let name = name.into();
        Self {
            index,
            id: id.into(),
            title: name.clone(),
            name,
            column_type,
            labels: Vec::new(),
            label_map: HashMap::new(),
        }
    }

    /// Parse one entry of the schema response's column list
    pub fn from_schema_entry(index: usize, entry: &serde_json::Value) -> Self {
        let id = entry["id"].as_str().unwrap_or_default().to_string();
        let title = clean_name(entry["title"].as_str().unwrap_or_default());
        let column_type = ColumnType::from_remote(entry["type"].as_str().unwrap_or_default());

        let mut column = Column {
            index,
            id,
            title: title.clone(),
            name: title,
            column_type,
            labels: Vec::new(),
            label_map: HashMap::new(),
        };
        if let Some(settings) = entry["settings_str"].as_str() {
            column.load_labels(settings);
        }
        column
    }

    // The remote delivers labels in two shapes inside settings_str:
    // a map of label-id -> name, or a list of {id, name} objects.
    fn load_labels(&mut self, settings: &str) {
        if settings.is_empty() || settings == "{}" {
            return;
        }
        let parsed: serde_json::Value = match serde_json::from_str(settings) {
            Ok(value) => value,
            Err(err) => {
                tracing::error!("unparseable column settings for [{}]: {}", self.name, err);
                return;
            }
        };

        match &parsed["labels"] {
            serde_json::Value::Object(map) => {
                for (label_id, label) in map {
                    if let Some(label) = label.as_str() {
                        self.labels.push(label.to_string());
                        if let Ok(label_id) = label_id.parse::<i64>() {
                            self.label_map.insert(label.to_string(), label_id);
                        }
                    }
                }
            }
            serde_json::Value::Array(items) => {
                for item in items {
                    if let Some(label) = item["name"].as_str() {
                        self.labels.push(label.to_string());
                        if let Some(label_id) = item["id"].as_i64() {
                            self.label_map.insert(label.to_string(), label_id);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    pub fn has_labels(&self) -> bool {
        !self.labels.is_empty()
    }

    /// True if the label is a member of this column's label set
    pub fn valid_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

/// Trim and collapse whitespace in a display name
pub fn clean_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Ordered map of display name → column, with a secondary id index
#[derive(Debug, Clone, Default)]
pub struct ColumnRegistry {
    columns: Vec<Column>,
    by_name: HashMap<String, usize>,
    by_id: HashMap<String, usize>,
}

impl ColumnRegistry {
    /// Build a registry from the board schema response
    /// (`data.boards[0].columns`).
    pub fn from_schema(document: &serde_json::Value) -> Self {
        let mut registry = ColumnRegistry::default();
        let columns = document["data"]["boards"][0]["columns"]
            .as_array()
            .cloned()
            .unwrap_or_default();
        if columns.is_empty() {
            tracing::warn!("looks like there are no columns");
        }
        for (index, entry) in columns.iter().enumerate() {
            registry.push(Column::from_schema_entry(index, entry));
        }
        registry
    }

    /// Build a registry straight from column definitions (sub-boards)
    pub fn from_columns(columns: impl IntoIterator<Item = Column>) -> Self {
        let mut registry = ColumnRegistry::default();
        for column in columns {
            registry.push(column);
        }
        registry
    }

    /// Insert a column, resolving duplicate display names by appending
    /// `_1`, `_2`, … in first-seen order. The suffixing is deterministic so
    /// repeated loads of the same schema map rows identically.
    pub fn push(&mut self, mut column: Column) {
        let base = column.name.clone();
        let mut suffix = 1;
        while self.by_name.contains_key(&column.name) {
            column.name = format!("{}_{}", base, suffix);
            suffix += 1;
        }
        let slot = self.columns.len();
        self.by_name.insert(column.name.clone(), slot);
        self.by_id.insert(column.id.clone(), slot);
        self.columns.push(column);
    }

    pub fn get(&self, name: &str) -> Option<&Column> {
        self.by_name.get(name).map(|slot| &self.columns[*slot])
    }

    /// O(1) lookup by the stable remote id, used during rehydration
    pub fn get_by_id(&self, id: &str) -> Option<&Column> {
        self.by_id.get(id).map(|slot| &self.columns[*slot])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Columns in display order
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Resolve display names to column ids, passing unknown names through
    pub fn field_ids(&self, names: &[String]) -> Vec<String> {
        names
            .iter()
            .map(|name| {
                self.get(name)
                    .map(|column| column.id.clone())
                    .unwrap_or_else(|| name.clone())
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
