use serde::{Deserialize, Serialize};

/// A row image: column name to JSON value, as decoded by the CDC engine.
pub type RowImage = serde_json::Map<String, serde_json::Value>;

/// The kind of mutation that produced a change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    /// Parse a CDC operation code (`c`, `u`, `d`). Codes are case-insensitive.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.to_ascii_lowercase().as_str() {
            "c" => Some(Operation::Create),
            "u" => Some(Operation::Update),
            "d" => Some(Operation::Delete),
            _ => None,
        }
    }

    /// The single-letter CDC code for this operation.
    pub fn code(&self) -> &'static str {
        match self {
            Operation::Create => "c",
            Operation::Update => "u",
            Operation::Delete => "d",
        }
    }
}

/// One decoded database mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// The type of operation (create, update, delete).
    pub op: Operation,
    /// Source database name.
    pub database: String,
    /// Source table name.
    pub table: String,
    /// Row image prior to the change (update, delete).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<RowImage>,
    /// Row image following the change (create, update).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<RowImage>,
}

impl ChangeEvent {
    /// Get the row image relevant to this event.
    /// For creates/updates, returns `after`; for deletes, returns `before`.
    pub fn row(&self) -> Option<&RowImage> {
        match self.op {
            Operation::Create | Operation::Update => self.after.as_ref(),
            Operation::Delete => self.before.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn image(value: serde_json::Value) -> RowImage {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_operation_codes() {
        assert_eq!(Operation::from_code("c"), Some(Operation::Create));
        assert_eq!(Operation::from_code("U"), Some(Operation::Update));
        assert_eq!(Operation::from_code("d"), Some(Operation::Delete));
        assert_eq!(Operation::from_code("r"), None);
        assert_eq!(Operation::from_code(""), None);
        assert_eq!(Operation::Update.code(), "u");
    }

    #[test]
    fn test_change_event_row() {
        let create = ChangeEvent {
            op: Operation::Create,
            database: "shop".into(),
            table: "orders".into(),
            before: None,
            after: Some(image(json!({"id": "A"}))),
        };
        assert_eq!(create.row().and_then(|r| r.get("id")), Some(&json!("A")));

        let delete = ChangeEvent {
            op: Operation::Delete,
            database: "shop".into(),
            table: "orders".into(),
            before: Some(image(json!({"id": "B"}))),
            after: None,
        };
        assert_eq!(delete.row().and_then(|r| r.get("id")), Some(&json!("B")));
    }
}
