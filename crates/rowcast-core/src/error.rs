use thiserror::Error;

/// Errors that can occur in rowcast-core.
#[derive(Debug, Error)]
pub enum Error {
    #[error("no key field configured for table '{0}'")]
    MissingKeyConfig(String),

    #[error("key field '{field}' missing from row image of table '{table}'")]
    MissingKeyField { table: String, field: String },

    #[error("key field '{field}' of table '{table}' is null")]
    NullKey { table: String, field: String },

    #[error("missing {image} row image for '{op}' event")]
    MissingRowImage { op: &'static str, image: &'static str },

    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl Error {
    /// Errors caused by configuration or row content rather than a broken envelope.
    pub fn is_key_error(&self) -> bool {
        matches!(
            self,
            Error::MissingKeyConfig(_) | Error::MissingKeyField { .. } | Error::NullKey { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
