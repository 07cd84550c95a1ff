mod client;
mod error;
mod jsonl;
mod manager;
mod memory;
mod shutdown;

pub use client::{dispatch, Connector, TopicSession};
pub use error::{SinkError, SinkResult};
pub use jsonl::{JsonLinesConnector, JsonLinesSession, JsonLinesTarget};
pub use manager::{ReconnectPolicy, SessionManager, SessionState};
pub use memory::{MemorySession, MemoryTopicStore};
pub use shutdown::{shutdown_channel, Shutdown, ShutdownTx};
