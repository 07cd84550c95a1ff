use serde_json::Value;

use crate::cache::IndexCache;
use crate::table::TableMode;
use crate::topic::{PatchOp, TopicOp, TopicPath, TopicShape};
use crate::types::RowImage;

/// Turns keyed row changes into topic operations.
///
/// The projector owns the [`IndexCache`]. Every operation it returns must be
/// applied to the topic store in order before the next call, because array
/// positions are computed against the cache as left by the previous call.
#[derive(Debug, Default)]
pub struct Projector {
    cache: IndexCache,
}

impl Projector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache(&self) -> &IndexCache {
        &self.cache
    }

    /// Project a created or updated row.
    pub fn upsert(
        &mut self,
        database: &str,
        table: &str,
        mode: TableMode,
        key: &str,
        row: &RowImage,
    ) -> Vec<TopicOp> {
        let value = Value::Object(row.clone());
        match mode {
            TableMode::Row => vec![TopicOp::set_value(
                TopicPath::row(database, table, key),
                value,
            )],
            TableMode::Array => self.upsert_array(TopicPath::table(database, table), key, value),
            TableMode::Object => self.upsert_object(TopicPath::table(database, table), key, value),
        }
    }

    /// Project a deleted row.
    pub fn delete(&mut self, database: &str, table: &str, mode: TableMode, key: &str) -> Vec<TopicOp> {
        match mode {
            // Row topics carry no tracking state, so the delete is unconditional.
            TableMode::Row => vec![TopicOp::remove(TopicPath::row(database, table, key))],
            TableMode::Array => {
                let path = TopicPath::table(database, table);
                match self.cache.remove(path.as_str(), key) {
                    Some(index) => vec![TopicOp::patch(path, PatchOp::remove_index(index))],
                    None => vec![],
                }
            }
            TableMode::Object => {
                let path = TopicPath::table(database, table);
                match self.cache.remove(path.as_str(), key) {
                    Some(_) => vec![TopicOp::patch(path, PatchOp::remove_field(key))],
                    None => vec![],
                }
            }
        }
    }

    fn upsert_array(&mut self, path: TopicPath, key: &str, value: Value) -> Vec<TopicOp> {
        let mut ops = self.ensure_topic(&path, TopicShape::Sequence);

        match self.cache.position(path.as_str(), key) {
            Some(index) => ops.push(TopicOp::patch(path, PatchOp::replace_index(index, value))),
            None => {
                self.cache.insert(path.as_str(), key);
                ops.push(TopicOp::patch(path, PatchOp::append(value)));
            }
        }
        ops
    }

    fn upsert_object(&mut self, path: TopicPath, key: &str, value: Value) -> Vec<TopicOp> {
        let mut ops = self.ensure_topic(&path, TopicShape::Mapping);

        if self.cache.insert(path.as_str(), key).is_some() {
            ops.push(TopicOp::patch(path, PatchOp::add_field(key, value)));
        } else {
            ops.push(TopicOp::patch(path, PatchOp::replace_field(key, value)));
        }
        ops
    }

    /// Create the shared topic the first time this process touches the table.
    fn ensure_topic(&mut self, path: &TopicPath, shape: TopicShape) -> Vec<TopicOp> {
        if self.cache.register_table(path.as_str()) {
            vec![TopicOp::create_empty(path.clone(), shape)]
        } else {
            vec![]
        }
    }
}
