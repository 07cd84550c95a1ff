pub mod cache;
pub mod envelope;
pub mod error;
pub mod key;
pub mod projector;
pub mod router;
pub mod table;
pub mod topic;
pub mod types;

pub use cache::IndexCache;
pub use envelope::{decode_envelope, Decoded};
pub use error::{Error, Result};
pub use key::{extract_key, key_to_string};
pub use projector::Projector;
pub use router::{RouteStats, Router};
pub use table::{ProjectionConfig, TableConfig, TableMode};
pub use topic::{escape_pointer_token, unescape_pointer_token, PatchOp, TopicOp, TopicPath, TopicShape};
pub use types::{ChangeEvent, Operation, RowImage};
