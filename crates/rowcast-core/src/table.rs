use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// How a table is represented in the topic store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableMode {
    /// One topic per row at `database/table/key`.
    #[default]
    Row,
    /// One topic at `database/table` holding an array of row images.
    Array,
    /// One topic at `database/table` holding a key to row image object.
    Object,
}

impl TableMode {
    /// Resolve a configured mode value.
    ///
    /// `array` and `object` (case-insensitive) select those modes; anything
    /// else, including no value at all, resolves to [`TableMode::Row`].
    pub fn resolve(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("array") => TableMode::Array,
            Some("object") => TableMode::Object,
            _ => TableMode::Row,
        }
    }

    /// Whether `value` names a mode explicitly (rather than falling back to row).
    pub fn is_recognized(value: &str) -> bool {
        matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "row" | "array" | "object"
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TableMode::Row => "row",
            TableMode::Array => "array",
            TableMode::Object => "object",
        }
    }
}

impl fmt::Display for TableMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Projection settings for one source table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableConfig {
    /// Field of the row image that identifies the row.
    /// Tables without one are never projected.
    pub key_field: Option<String>,
    /// Topic representation.
    pub mode: TableMode,
}

impl TableConfig {
    pub fn new(key_field: impl Into<String>) -> Self {
        Self {
            key_field: Some(key_field.into()),
            mode: TableMode::default(),
        }
    }

    pub fn mode(mut self, mode: TableMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Read-only projection settings for every configured table, keyed by table name.
#[derive(Debug, Clone, Default)]
pub struct ProjectionConfig {
    tables: HashMap<String, TableConfig>,
}

impl ProjectionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the settings for a table.
    pub fn with_table(mut self, table: impl Into<String>, config: TableConfig) -> Self {
        self.tables.insert(table.into(), config);
        self
    }

    pub fn insert(&mut self, table: impl Into<String>, config: TableConfig) {
        self.tables.insert(table.into(), config);
    }

    pub fn table(&self, table: &str) -> Option<&TableConfig> {
        self.tables.get(table)
    }

    /// Resolve the representation of a table. Unconfigured tables are rows.
    pub fn resolve_mode(&self, table: &str) -> TableMode {
        self.tables
            .get(table)
            .map(|t| t.mode)
            .unwrap_or_default()
    }

    /// The configured key field of a table, if any.
    pub fn key_field(&self, table: &str) -> Option<&str> {
        self.tables
            .get(table)
            .and_then(|t| t.key_field.as_deref())
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TableConfig)> {
        self.tables.iter().map(|(name, config)| (name.as_str(), config))
    }
}
