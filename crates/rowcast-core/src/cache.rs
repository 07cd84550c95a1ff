use std::collections::HashMap;

/// Per-table registry of row keys.
///
/// For array topics the order of a table's keys is the order of the values in
/// the topic, so a key's position in the sequence is the array index it is
/// patched at. Object topics reuse the same structure as a membership set.
///
/// Tables are identified by the shared topic they project into
/// (`database/table`), so equally named tables in two databases never share
/// state. The cache is in-memory only and starts empty on every process start.
#[derive(Debug, Default, Clone)]
pub struct IndexCache {
    tables: HashMap<String, Vec<String>>,
}

impl IndexCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the table has been registered.
    pub fn has_table(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    /// Register a table with an empty key sequence.
    /// Returns false if the table was already registered.
    pub fn register_table(&mut self, table: &str) -> bool {
        if self.tables.contains_key(table) {
            return false;
        }
        self.tables.insert(table.to_string(), Vec::new());
        true
    }

    /// Position of `key` within the table's sequence.
    pub fn position(&self, table: &str, key: &str) -> Option<usize> {
        self.tables
            .get(table)
            .and_then(|keys| keys.iter().position(|k| k == key))
    }

    pub fn contains(&self, table: &str, key: &str) -> bool {
        self.position(table, key).is_some()
    }

    /// Append `key` to the table's sequence, registering the table if needed.
    /// Returns the index assigned to the key, or `None` if it was already present.
    pub fn insert(&mut self, table: &str, key: &str) -> Option<usize> {
        let keys = self.tables.entry(table.to_string()).or_default();
        if keys.iter().any(|k| k == key) {
            return None;
        }
        keys.push(key.to_string());
        Some(keys.len() - 1)
    }

    /// Remove `key` from the table's sequence.
    ///
    /// Returns the position the key held before removal. Every key after it
    /// moves one position towards the front, matching how an array topic
    /// shifts after an element is removed.
    pub fn remove(&mut self, table: &str, key: &str) -> Option<usize> {
        let keys = self.tables.get_mut(table)?;
        let index = keys.iter().position(|k| k == key)?;
        keys.remove(index);
        Some(index)
    }

    /// The table's keys in positional order.
    pub fn keys(&self, table: &str) -> Option<&[String]> {
        self.tables.get(table).map(Vec::as_slice)
    }

    /// Number of keys tracked for a table.
    pub fn len(&self, table: &str) -> usize {
        self.tables.get(table).map_or(0, Vec::len)
    }

    /// Names of all registered tables.
    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
