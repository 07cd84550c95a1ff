use thiserror::Error;

/// Errors from topic store sessions.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("session closed")]
    SessionClosed,

    #[error("not connected")]
    NotConnected,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("topic not found: {0}")]
    TopicNotFound(String),

    #[error("invalid patch for '{topic}': {message}")]
    InvalidPatch { topic: String, message: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("shutdown requested")]
    Shutdown,
}

impl SinkError {
    /// Check if this error is retryable.
    ///
    /// Retryable errors mean the session is unusable; the manager reconnects
    /// and repeats the operation.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SinkError::ConnectionFailed(_)
                | SinkError::SessionClosed
                | SinkError::NotConnected
                | SinkError::Io(_)
        )
    }

    /// Check if this error is permanent for the operation that caused it.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            SinkError::TopicNotFound(_)
                | SinkError::InvalidPatch { .. }
                | SinkError::Serialization(_)
        )
    }
}

pub type SinkResult<T> = Result<T, SinkError>;
