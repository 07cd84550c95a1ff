use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::types::{ChangeEvent, Operation, RowImage};

/// Outcome of decoding one CDC envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// A data change ready to be projected.
    Change(ChangeEvent),
    /// The record carries no payload (null record, heartbeat, tombstone).
    NoPayload,
    /// The payload has no operation field.
    NoOperation,
    /// The operation code is not create, update or delete.
    UnknownOperation(String),
}

/// CDC envelope as emitted by the change-data-capture engine.
#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(default)]
    payload: Option<RawPayload>,
}

#[derive(Debug, Deserialize)]
struct RawPayload {
    #[serde(default)]
    op: Option<String>,
    #[serde(default)]
    source: Option<RawSource>,
    #[serde(default)]
    before: Option<Value>,
    #[serde(default)]
    after: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawSource {
    #[serde(default)]
    db: Option<String>,
    #[serde(default)]
    table: Option<String>,
}

/// Decode a serialized envelope of the form
/// `{"payload": {"op": .., "source": {"db": .., "table": ..}, "before": .., "after": ..}}`.
///
/// Empty input and the JSON `null` record decode to [`Decoded::NoPayload`].
/// Envelopes that cannot be parsed, or whose change lacks a source
/// identifier or the row image its operation needs, are errors.
pub fn decode_envelope(raw: &str) -> Result<Decoded> {
    if raw.trim().is_empty() {
        return Ok(Decoded::NoPayload);
    }

    let envelope: Option<RawEnvelope> = serde_json::from_str(raw)?;
    let Some(payload) = envelope.and_then(|e| e.payload) else {
        return Ok(Decoded::NoPayload);
    };

    let Some(code) = payload.op else {
        return Ok(Decoded::NoOperation);
    };

    let Some(op) = Operation::from_code(&code) else {
        return Ok(Decoded::UnknownOperation(code.to_ascii_lowercase()));
    };

    let source = payload
        .source
        .ok_or_else(|| Error::MalformedEnvelope("missing source descriptor".into()))?;
    let database = source
        .db
        .ok_or_else(|| Error::MalformedEnvelope("missing source.db".into()))?;
    let table = source
        .table
        .ok_or_else(|| Error::MalformedEnvelope("missing source.table".into()))?;

    let before = row_image(payload.before, "before")?;
    let after = row_image(payload.after, "after")?;

    let event = ChangeEvent {
        op,
        database,
        table,
        before,
        after,
    };

    if event.row().is_none() {
        let image = match op {
            Operation::Create | Operation::Update => "after",
            Operation::Delete => "before",
        };
        return Err(Error::MissingRowImage {
            op: op.code(),
            image,
        });
    }

    Ok(Decoded::Change(event))
}

fn row_image(value: Option<Value>, name: &str) -> Result<Option<RowImage>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(other) => Err(Error::MalformedEnvelope(format!(
            "'{}' is not an object: {}",
            name, other
        ))),
    }
}
