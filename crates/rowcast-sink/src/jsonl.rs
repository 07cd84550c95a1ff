use std::future::Future;
use std::path::PathBuf;

use rowcast_core::{PatchOp, TopicOp, TopicPath, TopicShape};
use serde::Serialize;
use serde_json::Value;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::client::{Connector, TopicSession};
use crate::error::{SinkError, SinkResult};

/// Where a [`JsonLinesConnector`] writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsonLinesTarget {
    Stdout,
    /// Appended to; created if missing.
    File(PathBuf),
}

/// A topic store transport that writes every operation as one JSON line.
///
/// Each session starts with a `{"op":"session",...}` record so a consumer
/// can tell where a reconnect happened.
#[derive(Debug, Clone)]
pub struct JsonLinesConnector {
    target: JsonLinesTarget,
    principal: Option<String>,
}

#[derive(Serialize)]
struct SessionRecord<'a> {
    op: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    principal: Option<&'a str>,
}

impl JsonLinesConnector {
    pub fn new(target: JsonLinesTarget) -> Self {
        Self {
            target,
            principal: None,
        }
    }

    /// Identity recorded in each session header.
    pub fn with_principal(mut self, principal: impl Into<String>) -> Self {
        self.principal = Some(principal.into());
        self
    }
}

impl Connector for JsonLinesConnector {
    type Session = JsonLinesSession;

    fn connect(&self) -> impl Future<Output = SinkResult<JsonLinesSession>> + Send {
        let target = self.target.clone();
        let principal = self.principal.clone();
        async move {
            let writer: Box<dyn AsyncWrite + Send + Unpin> = match &target {
                JsonLinesTarget::Stdout => Box::new(tokio::io::stdout()),
                JsonLinesTarget::File(path) => {
                    let file = OpenOptions::new()
                        .create(true)
                        .append(true)
                        .open(path)
                        .await
                        .map_err(|e| {
                            SinkError::ConnectionFailed(format!("{}: {}", path.display(), e))
                        })?;
                    Box::new(file)
                }
            };

            let mut session = JsonLinesSession { writer, open: true };
            session
                .write_record(&SessionRecord {
                    op: "session",
                    principal: principal.as_deref(),
                })
                .await?;
            Ok(session)
        }
    }

    fn endpoint(&self) -> String {
        match &self.target {
            JsonLinesTarget::Stdout => "stdout".to_string(),
            JsonLinesTarget::File(path) => path.display().to_string(),
        }
    }
}

/// A session writing JSON lines.
pub struct JsonLinesSession {
    writer: Box<dyn AsyncWrite + Send + Unpin>,
    open: bool,
}

impl JsonLinesSession {
    async fn write_record<T: Serialize>(&mut self, record: &T) -> SinkResult<()> {
        if !self.open {
            return Err(SinkError::SessionClosed);
        }

        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let written = match self.writer.write_all(&line).await {
            Ok(()) => self.writer.flush().await,
            Err(e) => Err(e),
        };

        if let Err(e) = written {
            self.open = false;
            return Err(SinkError::Io(e));
        }
        Ok(())
    }

    async fn write_op(&mut self, op: TopicOp) -> SinkResult<()> {
        debug!(op = op.kind(), path = %op.path(), "Writing topic operation");
        self.write_record(&op).await
    }
}

impl TopicSession for JsonLinesSession {
    fn is_open(&self) -> bool {
        self.open
    }

    fn create_empty_topic(
        &mut self,
        path: &TopicPath,
        shape: TopicShape,
    ) -> impl Future<Output = SinkResult<()>> + Send {
        self.write_op(TopicOp::create_empty(path.clone(), shape))
    }

    fn set_topic_value(
        &mut self,
        path: &TopicPath,
        value: &Value,
    ) -> impl Future<Output = SinkResult<()>> + Send {
        self.write_op(TopicOp::set_value(path.clone(), value.clone()))
    }

    fn apply_patch(
        &mut self,
        path: &TopicPath,
        patch: &[PatchOp],
    ) -> impl Future<Output = SinkResult<()>> + Send {
        self.write_op(TopicOp::Patch {
            path: path.clone(),
            patch: patch.to_vec(),
        })
    }

    fn remove_topic(&mut self, path: &TopicPath) -> impl Future<Output = SinkResult<()>> + Send {
        self.write_op(TopicOp::remove(path.clone()))
    }

    fn close(&mut self) -> impl Future<Output = ()> + Send {
        async move {
            if self.open {
                let _ = self.writer.flush().await;
                let _ = self.writer.shutdown().await;
                self.open = false;
            }
        }
    }
}
