use std::future::Future;

use rowcast_core::{PatchOp, TopicOp, TopicPath, TopicShape};
use serde_json::Value;

use crate::error::SinkResult;

/// An open session against a topic store.
pub trait TopicSession: Send {
    /// Whether the session is still usable.
    fn is_open(&self) -> bool;

    /// Create a topic holding the empty value of `shape`, overwriting any
    /// existing value at that path.
    fn create_empty_topic(
        &mut self,
        path: &TopicPath,
        shape: TopicShape,
    ) -> impl Future<Output = SinkResult<()>> + Send;

    /// Set the value of a topic, creating it if it does not exist.
    fn set_topic_value(
        &mut self,
        path: &TopicPath,
        value: &Value,
    ) -> impl Future<Output = SinkResult<()>> + Send;

    /// Apply a JSON Patch to an existing topic.
    fn apply_patch(
        &mut self,
        path: &TopicPath,
        patch: &[PatchOp],
    ) -> impl Future<Output = SinkResult<()>> + Send;

    /// Remove a topic and all topics beneath it.
    fn remove_topic(&mut self, path: &TopicPath) -> impl Future<Output = SinkResult<()>> + Send;

    /// Release the session.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

/// Opens sessions against a topic store.
pub trait Connector: Send + Sync {
    type Session: TopicSession;

    /// Attempt to open a new session.
    fn connect(&self) -> impl Future<Output = SinkResult<Self::Session>> + Send;

    /// Human-readable description of the endpoint, for logging.
    fn endpoint(&self) -> String;
}

/// Issue a projector operation on a session.
pub async fn dispatch<S: TopicSession>(session: &mut S, op: &TopicOp) -> SinkResult<()> {
    match op {
        TopicOp::CreateEmpty { path, shape } => session.create_empty_topic(path, *shape).await,
        TopicOp::SetValue { path, value } => session.set_topic_value(path, value).await,
        TopicOp::Patch { path, patch } => session.apply_patch(path, patch).await,
        TopicOp::Remove { path } => session.remove_topic(path).await,
    }
}
