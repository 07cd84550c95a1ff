use tracing::{debug, warn};

use crate::cache::IndexCache;
use crate::envelope::{decode_envelope, Decoded};
use crate::error::Error;
use crate::key::extract_key;
use crate::projector::Projector;
use crate::table::ProjectionConfig;
use crate::topic::TopicOp;
use crate::types::{ChangeEvent, Operation};

/// Counters describing what the router did with the envelopes it was given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteStats {
    /// Envelopes handed to the router.
    pub envelopes: u64,
    /// Change events that reached the projector.
    pub projected: u64,
    /// Records without a payload.
    pub no_payload: u64,
    /// Payloads without an operation.
    pub no_operation: u64,
    /// Envelopes that could not be decoded.
    pub malformed: u64,
    /// Operation codes other than create, update, delete.
    pub unknown_operation: u64,
    /// Events dropped because no key could be extracted.
    pub dropped_no_key: u64,
    /// Topic operations emitted.
    pub topic_ops: u64,
}

impl RouteStats {
    /// Records that were skipped or dropped instead of projected.
    pub fn skipped(&self) -> u64 {
        self.no_payload
            + self.no_operation
            + self.malformed
            + self.unknown_operation
            + self.dropped_no_key
    }

    /// Add another set of counters to this one.
    pub fn merge(&mut self, other: &RouteStats) {
        self.envelopes += other.envelopes;
        self.projected += other.projected;
        self.no_payload += other.no_payload;
        self.no_operation += other.no_operation;
        self.malformed += other.malformed;
        self.unknown_operation += other.unknown_operation;
        self.dropped_no_key += other.dropped_no_key;
        self.topic_ops += other.topic_ops;
    }
}

/// Entry point for CDC batches.
///
/// Decodes each envelope, resolves the table's mode and key, and hands the
/// change to the [`Projector`]. A bad envelope never affects the ones after it.
pub struct Router {
    config: ProjectionConfig,
    projector: Projector,
    stats: RouteStats,
}

impl Router {
    pub fn new(config: ProjectionConfig) -> Self {
        Self {
            config,
            projector: Projector::new(),
            stats: RouteStats::default(),
        }
    }

    pub fn cache(&self) -> &IndexCache {
        self.projector.cache()
    }

    pub fn stats(&self) -> &RouteStats {
        &self.stats
    }

    /// Route every envelope of a batch in order and collect the resulting
    /// topic operations.
    pub fn route_batch<I, S>(&mut self, envelopes: I) -> Vec<TopicOp>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ops = Vec::new();
        for raw in envelopes {
            // A record without payload only skips itself; the rest of the batch is still routed.
            ops.extend(self.route_envelope(raw.as_ref()));
        }
        ops
    }

    /// Route a single serialized envelope.
    pub fn route_envelope(&mut self, raw: &str) -> Vec<TopicOp> {
        self.stats.envelopes += 1;

        match decode_envelope(raw) {
            Ok(Decoded::Change(event)) => self.route_event(&event),
            Ok(Decoded::NoPayload) => {
                debug!("Skipping record without payload");
                self.stats.no_payload += 1;
                vec![]
            }
            Ok(Decoded::NoOperation) => {
                debug!("Skipping payload without operation");
                self.stats.no_operation += 1;
                vec![]
            }
            Ok(Decoded::UnknownOperation(op)) => {
                warn!(op = %op, "Unknown operation '{}'", op);
                self.stats.unknown_operation += 1;
                vec![]
            }
            Err(e) => {
                warn!(error = %e, "Skipping malformed envelope");
                self.stats.malformed += 1;
                vec![]
            }
        }
    }

    /// Route an already decoded change event.
    pub fn route_event(&mut self, event: &ChangeEvent) -> Vec<TopicOp> {
        let Some(row) = event.row() else {
            warn!(
                database = %event.database,
                table = %event.table,
                op = event.op.code(),
                "Skipping change without row image"
            );
            self.stats.malformed += 1;
            return vec![];
        };

        let key = match extract_key(&self.config, &event.table, row) {
            Ok(key) => key,
            Err(e) => {
                self.report_key_error(event, &e);
                self.stats.dropped_no_key += 1;
                return vec![];
            }
        };

        let mode = self.config.resolve_mode(&event.table);
        let ops = match event.op {
            Operation::Create | Operation::Update => {
                self.projector
                    .upsert(&event.database, &event.table, mode, &key, row)
            }
            Operation::Delete => self
                .projector
                .delete(&event.database, &event.table, mode, &key),
        };

        debug!(
            database = %event.database,
            table = %event.table,
            op = event.op.code(),
            mode = %mode,
            key = %key,
            ops = ops.len(),
            "Projected change"
        );

        self.stats.projected += 1;
        self.stats.topic_ops += ops.len() as u64;
        ops
    }

    fn report_key_error(&self, event: &ChangeEvent, error: &Error) {
        match error {
            Error::MissingKeyConfig(_) => {
                warn!(table = %event.table, "No key specified for table, dropping event")
            }
            _ => warn!(
                database = %event.database,
                table = %event.table,
                error = %error,
                "Could not extract row key, dropping event"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{TableConfig, TableMode};
    use crate::topic::{PatchOp, TopicPath, TopicShape};
    use serde_json::json;

    fn envelope(op: &str, table: &str, before: serde_json::Value, after: serde_json::Value) -> String {
        json!({
            "payload": {
                "op": op,
                "source": {"db": "db", "table": table},
                "before": before,
                "after": after,
            }
        })
        .to_string()
    }

    fn router() -> Router {
        Router::new(
            ProjectionConfig::new()
                .with_table("orders", TableConfig::new("id").mode(TableMode::Array))
                .with_table("prefs", TableConfig::new("id").mode(TableMode::Object))
                .with_table("users", TableConfig::new("id")),
        )
    }

    #[test]
    fn test_orders_array_scenario() {
        let mut router = router();
        let ops = router.route_batch([
            envelope("c", "orders", json!(null), json!({"id": "A", "amt": 10})),
            envelope("c", "orders", json!(null), json!({"id": "B", "amt": 20})),
            envelope("u", "orders", json!({"id": "A", "amt": 10}), json!({"id": "A", "amt": 15})),
            envelope("d", "orders", json!({"id": "A", "amt": 15}), json!(null)),
        ]);

        let path = TopicPath::table("db", "orders");
        assert_eq!(
            ops,
            vec![
                TopicOp::create_empty(path.clone(), TopicShape::Sequence),
                TopicOp::patch(path.clone(), PatchOp::append(json!({"id": "A", "amt": 10}))),
                TopicOp::patch(path.clone(), PatchOp::append(json!({"id": "B", "amt": 20}))),
                TopicOp::patch(path.clone(), PatchOp::replace_index(0, json!({"id": "A", "amt": 15}))),
                TopicOp::patch(path, PatchOp::remove_index(0)),
            ]
        );
        assert_eq!(router.cache().keys("db/orders"), Some(&["B".to_string()][..]));
    }

    #[test]
    fn test_users_row_delete_without_create() {
        let mut router = router();
        let ops = router.route_envelope(&envelope("d", "users", json!({"id": "X"}), json!(null)));
        assert_eq!(ops, vec![TopicOp::remove(TopicPath::row("db", "users", "X"))]);
    }

    #[test]
    fn test_null_record_does_not_end_batch() {
        // Regression: a null record mid-batch used to abandon the rest of the batch.
        let mut router = router();
        let ops = router.route_batch([
            envelope("c", "users", json!(null), json!({"id": "1"})),
            "null".to_string(),
            envelope("c", "users", json!(null), json!({"id": "2"})),
        ]);

        assert_eq!(ops.len(), 2);
        assert_eq!(ops[1].path(), &TopicPath::row("db", "users", "2"));
        assert_eq!(router.stats().no_payload, 1);
        assert_eq!(router.stats().projected, 2);
    }

    #[test]
    fn test_skips_bad_records_and_continues() {
        let mut router = router();
        let ops = router.route_batch([
            "{broken".to_string(),
            json!({"payload": {"source": {"db": "db", "table": "users"}}}).to_string(),
            envelope("r", "users", json!(null), json!({"id": "1"})),
            json!({"payload": {"op": "c", "after": {"id": "1"}}}).to_string(),
            envelope("c", "users", json!(null), json!({"id": "2"})),
        ]);

        assert_eq!(ops.len(), 1);
        let stats = router.stats();
        assert_eq!(stats.envelopes, 5);
        assert_eq!(stats.malformed, 2);
        assert_eq!(stats.no_operation, 1);
        assert_eq!(stats.unknown_operation, 1);
        assert_eq!(stats.projected, 1);
        assert_eq!(stats.skipped(), 4);
    }

    #[test]
    fn test_missing_key_config_drops_event() {
        let mut router = router();
        let ops = router.route_envelope(&envelope("c", "audit", json!(null), json!({"id": "1"})));
        assert!(ops.is_empty());
        assert_eq!(router.stats().dropped_no_key, 1);
        assert!(router.cache().is_empty());
    }

    #[test]
    fn test_missing_key_field_leaves_cache_untouched() {
        let mut router = router();
        let ops = router.route_envelope(&envelope("c", "orders", json!(null), json!({"amt": 1})));
        assert!(ops.is_empty());
        assert!(!router.cache().has_table("db/orders"));
        assert_eq!(router.stats().dropped_no_key, 1);
    }

    #[test]
    fn test_object_create_then_update() {
        let mut router = router();
        let ops = router.route_batch([
            envelope("c", "prefs", json!(null), json!({"id": "u1", "theme": "dark"})),
            envelope("u", "prefs", json!({"id": "u1"}), json!({"id": "u1", "theme": "light"})),
        ]);

        let patches: Vec<_> = ops
            .iter()
            .filter_map(|op| match op {
                TopicOp::Patch { patch, .. } => Some(&patch[0]),
                _ => None,
            })
            .collect();
        assert_eq!(patches.len(), 2);
        assert!(matches!(patches[0], PatchOp::Add { .. }));
        assert!(matches!(patches[1], PatchOp::Replace { .. }));
    }

    #[test]
    fn test_stats_merge() {
        let mut total = RouteStats::default();
        let batch = RouteStats {
            envelopes: 3,
            projected: 2,
            no_payload: 1,
            topic_ops: 4,
            ..Default::default()
        };
        total.merge(&batch);
        total.merge(&batch);
        assert_eq!(total.envelopes, 6);
        assert_eq!(total.topic_ops, 8);
        assert_eq!(total.skipped(), 2);
    }
}
