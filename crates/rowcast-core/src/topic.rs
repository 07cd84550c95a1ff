use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Address of a topic in the topic store.
///
/// Paths are derived from the source relation: `database/table` for shared
/// (array and object) topics, `database/table/key` for per-row topics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopicPath(String);

impl TopicPath {
    /// Path of the topic shared by every row of a table.
    pub fn table(database: &str, table: &str) -> Self {
        TopicPath(format!("{}/{}", database, table))
    }

    /// Path of the topic holding a single row.
    pub fn row(database: &str, table: &str, key: &str) -> Self {
        TopicPath(format!("{}/{}/{}", database, table, key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether `other` is this path or lives underneath it.
    pub fn contains(&self, other: &str) -> bool {
        other == self.0
            || (other.len() > self.0.len()
                && other.starts_with(self.0.as_str())
                && other.as_bytes()[self.0.len()] == b'/')
    }
}

impl fmt::Display for TopicPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TopicPath {
    fn from(v: &str) -> Self {
        TopicPath(v.to_string())
    }
}

/// The value shape of a shared topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopicShape {
    /// An ordered sequence of row images (JSON array).
    Sequence,
    /// A key to row image mapping (JSON object).
    Mapping,
}

impl TopicShape {
    /// The empty value a freshly created topic of this shape holds.
    pub fn empty_value(&self) -> Value {
        match self {
            TopicShape::Sequence => Value::Array(Vec::new()),
            TopicShape::Mapping => Value::Object(serde_json::Map::new()),
        }
    }
}

/// A single JSON Patch (RFC 6902) operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOp {
    Add { path: String, value: Value },
    Replace { path: String, value: Value },
    Remove { path: String },
}

impl PatchOp {
    /// Append a value to the end of an array.
    pub fn append(value: Value) -> Self {
        PatchOp::Add {
            path: "/-".to_string(),
            value,
        }
    }

    /// Replace the array element at `index`.
    pub fn replace_index(index: usize, value: Value) -> Self {
        PatchOp::Replace {
            path: format!("/{}", index),
            value,
        }
    }

    /// Remove the array element at `index`; later elements shift left.
    pub fn remove_index(index: usize) -> Self {
        PatchOp::Remove {
            path: format!("/{}", index),
        }
    }

    /// Add a new field to an object.
    pub fn add_field(field: &str, value: Value) -> Self {
        PatchOp::Add {
            path: format!("/{}", escape_pointer_token(field)),
            value,
        }
    }

    /// Replace an existing object field.
    pub fn replace_field(field: &str, value: Value) -> Self {
        PatchOp::Replace {
            path: format!("/{}", escape_pointer_token(field)),
            value,
        }
    }

    /// Remove an object field.
    pub fn remove_field(field: &str) -> Self {
        PatchOp::Remove {
            path: format!("/{}", escape_pointer_token(field)),
        }
    }

    pub fn path(&self) -> &str {
        match self {
            PatchOp::Add { path, .. } | PatchOp::Replace { path, .. } | PatchOp::Remove { path } => {
                path
            }
        }
    }
}

/// Escape a JSON Pointer reference token (RFC 6901).
pub fn escape_pointer_token(token: &str) -> Cow<'_, str> {
    if token.contains(|c: char| c == '~' || c == '/') {
        Cow::Owned(token.replace('~', "~0").replace('/', "~1"))
    } else {
        Cow::Borrowed(token)
    }
}

/// Inverse of [`escape_pointer_token`].
pub fn unescape_pointer_token(token: &str) -> Cow<'_, str> {
    if token.contains('~') {
        Cow::Owned(token.replace("~1", "/").replace("~0", "~"))
    } else {
        Cow::Borrowed(token)
    }
}

/// An operation against the topic store, produced by the projector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TopicOp {
    /// Create a topic holding the empty value of `shape`, overwriting any
    /// existing content.
    CreateEmpty { path: TopicPath, shape: TopicShape },
    /// Set the full value of a topic, creating it if needed.
    SetValue { path: TopicPath, value: Value },
    /// Apply a JSON Patch to an existing topic.
    Patch { path: TopicPath, patch: Vec<PatchOp> },
    /// Remove a topic and everything beneath it.
    Remove { path: TopicPath },
}

impl TopicOp {
    pub fn create_empty(path: TopicPath, shape: TopicShape) -> Self {
        TopicOp::CreateEmpty { path, shape }
    }

    pub fn set_value(path: TopicPath, value: Value) -> Self {
        TopicOp::SetValue { path, value }
    }

    /// A patch carrying a single operation.
    pub fn patch(path: TopicPath, op: PatchOp) -> Self {
        TopicOp::Patch {
            path,
            patch: vec![op],
        }
    }

    pub fn remove(path: TopicPath) -> Self {
        TopicOp::Remove { path }
    }

    pub fn path(&self) -> &TopicPath {
        match self {
            TopicOp::CreateEmpty { path, .. }
            | TopicOp::SetValue { path, .. }
            | TopicOp::Patch { path, .. }
            | TopicOp::Remove { path } => path,
        }
    }

    /// Short name of the operation, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            TopicOp::CreateEmpty { .. } => "create_empty",
            TopicOp::SetValue { .. } => "set_value",
            TopicOp::Patch { .. } => "patch",
            TopicOp::Remove { .. } => "remove",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_topic_paths() {
        assert_eq!(TopicPath::table("shop", "orders").as_str(), "shop/orders");
        assert_eq!(TopicPath::row("shop", "users", "X").as_str(), "shop/users/X");
    }

    #[test]
    fn test_topic_path_contains() {
        let path = TopicPath::table("shop", "users");
        assert!(path.contains("shop/users"));
        assert!(path.contains("shop/users/X"));
        assert!(!path.contains("shop/users2"));
        assert!(!path.contains("shop"));
    }

    #[test]
    fn test_patch_serializes_as_json_patch() {
        let patch = vec![
            PatchOp::append(json!({"id": "A"})),
            PatchOp::replace_index(0, json!({"id": "A", "amt": 15})),
            PatchOp::remove_index(0),
        ];
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!([
                {"op": "add", "path": "/-", "value": {"id": "A"}},
                {"op": "replace", "path": "/0", "value": {"id": "A", "amt": 15}},
                {"op": "remove", "path": "/0"}
            ])
        );
    }

    #[test]
    fn test_field_paths_are_escaped() {
        assert_eq!(PatchOp::remove_field("a/b~c").path(), "/a~1b~0c");
        assert_eq!(unescape_pointer_token("a~1b~0c"), "a/b~c");
        assert_eq!(escape_pointer_token("plain"), Cow::Borrowed("plain"));
    }

    #[test]
    fn test_topic_op_wire_form() {
        let op = TopicOp::create_empty(TopicPath::table("shop", "orders"), TopicShape::Sequence);
        assert_eq!(
            serde_json::to_value(&op).unwrap(),
            json!({"op": "create_empty", "path": "shop/orders", "shape": "sequence"})
        );
        assert_eq!(op.kind(), "create_empty");
    }

    #[test]
    fn test_empty_values() {
        assert_eq!(TopicShape::Sequence.empty_value(), json!([]));
        assert_eq!(TopicShape::Mapping.empty_value(), json!({}));
    }
}
