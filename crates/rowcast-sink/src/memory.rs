use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rowcast_core::{unescape_pointer_token, PatchOp, TopicOp, TopicPath, TopicShape};
use serde_json::Value;

use crate::client::{Connector, TopicSession};
use crate::error::{SinkError, SinkResult};

/// An in-process topic store.
///
/// Holds topic values in memory and applies patches for real, so tests can
/// assert on the resulting documents. Connection refusals and session drops
/// can be injected to exercise reconnect handling.
#[derive(Clone, Default)]
pub struct MemoryTopicStore {
    state: Arc<Mutex<StoreState>>,
}

#[derive(Default)]
struct StoreState {
    topics: BTreeMap<TopicPath, Value>,
    /// Operations applied successfully, in order.
    log: Vec<TopicOp>,
    /// Id of the only session currently accepted.
    live_session: Option<u64>,
    next_session: u64,
    connection_attempts: u64,
    /// Number of upcoming connection attempts to refuse.
    refuse: u32,
    /// Kill the live session once this many more operations have run on it.
    drop_after: Option<u32>,
}

impl MemoryTopicStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Refuse the next `count` connection attempts.
    pub fn refuse_connections(&self, count: u32) {
        self.lock().refuse = count;
    }

    /// Close the live session after `ops` more operations succeed on it.
    pub fn drop_session_after(&self, ops: u32) {
        self.lock().drop_after = Some(ops);
    }

    /// Current value of a topic.
    pub fn topic(&self, path: &TopicPath) -> Option<Value> {
        self.lock().topics.get(path).cloned()
    }

    /// All topic paths, sorted.
    pub fn topic_paths(&self) -> Vec<TopicPath> {
        self.lock().topics.keys().cloned().collect()
    }

    /// Snapshot of every topic and its value.
    pub fn topics(&self) -> BTreeMap<TopicPath, Value> {
        self.lock().topics.clone()
    }

    /// Operations applied so far.
    pub fn operations(&self) -> Vec<TopicOp> {
        self.lock().log.clone()
    }

    /// Number of connection attempts, refused ones included.
    pub fn connection_attempts(&self) -> u64 {
        self.lock().connection_attempts
    }
}

impl Connector for MemoryTopicStore {
    type Session = MemorySession;

    fn connect(&self) -> impl Future<Output = SinkResult<MemorySession>> + Send {
        let store = self.clone();
        async move {
            let mut state = store.lock();
            state.connection_attempts += 1;

            if state.refuse > 0 {
                state.refuse -= 1;
                return Err(SinkError::ConnectionFailed(
                    "connection refused by memory store".to_string(),
                ));
            }

            state.next_session += 1;
            let id = state.next_session;
            state.live_session = Some(id);
            drop(state);

            Ok(MemorySession { store, id })
        }
    }

    fn endpoint(&self) -> String {
        "memory".to_string()
    }
}

/// A session on a [`MemoryTopicStore`].
pub struct MemorySession {
    store: MemoryTopicStore,
    id: u64,
}

impl MemorySession {
    /// Run `f` against the store if this session is still live.
    ///
    /// `f` sees the topics map and records nothing on error.
    fn run(
        &self,
        op: TopicOp,
        f: impl FnOnce(&mut BTreeMap<TopicPath, Value>) -> SinkResult<()>,
    ) -> SinkResult<()> {
        let mut state = self.store.lock();

        if state.live_session != Some(self.id) {
            return Err(SinkError::SessionClosed);
        }

        match state.drop_after {
            Some(0) => {
                state.drop_after = None;
                state.live_session = None;
                return Err(SinkError::SessionClosed);
            }
            Some(n) => state.drop_after = Some(n - 1),
            None => {}
        }

        f(&mut state.topics)?;
        state.log.push(op);
        Ok(())
    }
}

impl TopicSession for MemorySession {
    fn is_open(&self) -> bool {
        self.store.lock().live_session == Some(self.id)
    }

    fn create_empty_topic(
        &mut self,
        path: &TopicPath,
        shape: TopicShape,
    ) -> impl Future<Output = SinkResult<()>> + Send {
        let result = self.run(TopicOp::create_empty(path.clone(), shape), |topics| {
            topics.insert(path.clone(), shape.empty_value());
            Ok(())
        });
        async move { result }
    }

    fn set_topic_value(
        &mut self,
        path: &TopicPath,
        value: &Value,
    ) -> impl Future<Output = SinkResult<()>> + Send {
        let result = self.run(TopicOp::set_value(path.clone(), value.clone()), |topics| {
            topics.insert(path.clone(), value.clone());
            Ok(())
        });
        async move { result }
    }

    fn apply_patch(
        &mut self,
        path: &TopicPath,
        patch: &[PatchOp],
    ) -> impl Future<Output = SinkResult<()>> + Send {
        let op = TopicOp::Patch {
            path: path.clone(),
            patch: patch.to_vec(),
        };
        let result = self.run(op, |topics| {
            let current = topics
                .get(path)
                .ok_or_else(|| SinkError::TopicNotFound(path.to_string()))?;

            // Patches apply atomically: work on a copy and commit at the end.
            let mut doc = current.clone();
            for patch_op in patch {
                apply_patch_op(&mut doc, patch_op).map_err(|message| SinkError::InvalidPatch {
                    topic: path.to_string(),
                    message,
                })?;
            }
            topics.insert(path.clone(), doc);
            Ok(())
        });
        async move { result }
    }

    fn remove_topic(&mut self, path: &TopicPath) -> impl Future<Output = SinkResult<()>> + Send {
        let result = self.run(TopicOp::remove(path.clone()), |topics| {
            topics.retain(|existing, _| !path.contains(existing.as_str()));
            Ok(())
        });
        async move { result }
    }

    fn close(&mut self) -> impl Future<Output = ()> + Send {
        let mut state = self.store.lock();
        if state.live_session == Some(self.id) {
            state.live_session = None;
        }
        drop(state);
        async {}
    }
}

/// Split a JSON Pointer into unescaped reference tokens.
fn pointer_tokens(pointer: &str) -> Result<Vec<String>, String> {
    if pointer.is_empty() {
        return Ok(Vec::new());
    }
    let rest = pointer
        .strip_prefix('/')
        .ok_or_else(|| format!("pointer '{}' must start with '/'", pointer))?;
    Ok(rest
        .split('/')
        .map(|t| unescape_pointer_token(t).into_owned())
        .collect())
}

fn parse_index(token: &str, len: usize, allow_end: bool) -> Result<usize, String> {
    if token == "-" && allow_end {
        return Ok(len);
    }
    let index: usize = token
        .parse()
        .map_err(|_| format!("'{}' is not an array index", token))?;
    let limit = if allow_end { len } else { len.saturating_sub(1) };
    if (len == 0 && !allow_end) || index > limit {
        return Err(format!("index {} out of range for length {}", index, len));
    }
    Ok(index)
}

/// Apply one RFC 6902 operation to `doc`.
fn apply_patch_op(doc: &mut Value, op: &PatchOp) -> Result<(), String> {
    let mut tokens = pointer_tokens(op.path())?;
    let Some(last) = tokens.pop() else {
        // Whole-document target.
        return match op {
            PatchOp::Add { value, .. } | PatchOp::Replace { value, .. } => {
                *doc = value.clone();
                Ok(())
            }
            PatchOp::Remove { .. } => Err("cannot remove the document root".to_string()),
        };
    };

    let mut parent = doc;
    for token in &tokens {
        parent = match parent {
            Value::Object(map) => map
                .get_mut(token)
                .ok_or_else(|| format!("no field '{}'", token))?,
            Value::Array(items) => {
                let index = parse_index(token, items.len(), false)?;
                &mut items[index]
            }
            _ => return Err(format!("cannot descend into scalar at '{}'", token)),
        };
    }

    match (parent, op) {
        (Value::Array(items), PatchOp::Add { value, .. }) => {
            let index = parse_index(&last, items.len(), true)?;
            items.insert(index, value.clone());
        }
        (Value::Array(items), PatchOp::Replace { value, .. }) => {
            let index = parse_index(&last, items.len(), false)?;
            items[index] = value.clone();
        }
        (Value::Array(items), PatchOp::Remove { .. }) => {
            let index = parse_index(&last, items.len(), false)?;
            items.remove(index);
        }
        (Value::Object(map), PatchOp::Add { value, .. }) => {
            map.insert(last, value.clone());
        }
        (Value::Object(map), PatchOp::Replace { value, .. }) => {
            let slot = map
                .get_mut(&last)
                .ok_or_else(|| format!("no field '{}' to replace", last))?;
            *slot = value.clone();
        }
        (Value::Object(map), PatchOp::Remove { .. }) => {
            map.remove(&last)
                .ok_or_else(|| format!("no field '{}' to remove", last))?;
        }
        _ => return Err(format!("target of '{}' is not a container", op.path())),
    }
    Ok(())
}
