use serde_json::Value;

use crate::error::{Error, Result};
use crate::table::ProjectionConfig;
use crate::types::RowImage;

/// Extract the row key of a table's row image based on the configured key field.
///
/// Fails with [`Error::MissingKeyConfig`] when the table has no key field, and
/// with [`Error::MissingKeyField`] / [`Error::NullKey`] when the row image does
/// not carry a usable value for it. Callers drop the event in all three cases.
pub fn extract_key(config: &ProjectionConfig, table: &str, row: &RowImage) -> Result<String> {
    let field = config
        .key_field(table)
        .ok_or_else(|| Error::MissingKeyConfig(table.to_string()))?;

    let value = row.get(field).ok_or_else(|| Error::MissingKeyField {
        table: table.to_string(),
        field: field.to_string(),
    })?;

    key_to_string(value).ok_or_else(|| Error::NullKey {
        table: table.to_string(),
        field: field.to_string(),
    })
}

/// String form of a key value.
///
/// Strings are used verbatim, numbers and booleans in their JSON text form,
/// composite values as compact JSON. `null` has no key form.
pub fn key_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::TableConfig;
    use serde_json::json;

    fn row(value: Value) -> RowImage {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn config() -> ProjectionConfig {
        ProjectionConfig::new().with_table("orders", TableConfig::new("id"))
    }

    #[test]
    fn test_extract_string_key() {
        let key = extract_key(&config(), "orders", &row(json!({"id": "A", "amt": 10}))).unwrap();
        assert_eq!(key, "A");
    }

    #[test]
    fn test_extract_numeric_key() {
        let key = extract_key(&config(), "orders", &row(json!({"id": 42}))).unwrap();
        assert_eq!(key, "42");

        let key = extract_key(&config(), "orders", &row(json!({"id": 1.5}))).unwrap();
        assert_eq!(key, "1.5");
    }

    #[test]
    fn test_missing_key_config() {
        let err = extract_key(&config(), "users", &row(json!({"id": "X"}))).unwrap_err();
        assert!(matches!(err, Error::MissingKeyConfig(ref t) if t == "users"));
        assert!(err.is_key_error());
    }

    #[test]
    fn test_missing_key_field() {
        let err = extract_key(&config(), "orders", &row(json!({"amt": 10}))).unwrap_err();
        assert!(matches!(err, Error::MissingKeyField { ref field, .. } if field == "id"));
    }

    #[test]
    fn test_null_key() {
        let err = extract_key(&config(), "orders", &row(json!({"id": null}))).unwrap_err();
        assert!(matches!(err, Error::NullKey { .. }));
    }

    #[test]
    fn test_key_to_string_composites() {
        assert_eq!(key_to_string(&json!(true)), Some("true".into()));
        assert_eq!(key_to_string(&json!([1, 2])), Some("[1,2]".into()));
        assert_eq!(key_to_string(&Value::Null), None);
    }
}
