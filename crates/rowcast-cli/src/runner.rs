use anyhow::Result;
use tokio::io::AsyncBufRead;
use tracing::{debug, info, warn};

use rowcast_core::{RouteStats, Router};
use rowcast_sink::{Connector, SessionManager, Shutdown, SinkError};

use crate::source::BatchSource;

/// What a pipeline run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Batches fully applied and acknowledged.
    pub batches: u64,
    /// Offset of the last acknowledged record.
    pub committed_offset: u64,
    /// Topic operations the sink accepted.
    pub applied: u64,
    /// Topic operations the sink rejected permanently.
    pub rejected: u64,
    /// Whether the run ended because of a shutdown request.
    pub interrupted: bool,
    pub stats: RouteStats,
}

/// Route batches from `source` and apply the resulting topic operations.
///
/// A batch is acknowledged only after every operation it produced has been
/// applied. Operations are applied in order and one at a time; a lost
/// session blocks the pipeline until it is reestablished. Operations the
/// sink rejects permanently are logged and skipped.
pub async fn run_pipeline<C, R>(
    router: &mut Router,
    sessions: &mut SessionManager<C>,
    source: &mut BatchSource<R>,
    mut shutdown: Shutdown,
) -> Result<RunSummary>
where
    C: Connector,
    R: AsyncBufRead + Unpin,
{
    let mut summary = RunSummary::default();

    'batches: loop {
        let batch = tokio::select! {
            biased;
            _ = shutdown.requested() => {
                summary.interrupted = true;
                break;
            }
            batch = source.next_batch() => batch?,
        };

        let Some(batch) = batch else {
            break;
        };

        let ops = router.route_batch(&batch.records);
        debug!(
            records = batch.records.len(),
            topic_ops = ops.len(),
            end_offset = batch.end_offset,
            "Routed batch"
        );

        for op in &ops {
            match sessions.apply(op).await {
                Ok(()) => summary.applied += 1,
                Err(SinkError::Shutdown) => {
                    summary.interrupted = true;
                    break 'batches;
                }
                Err(e) if e.is_permanent() => {
                    warn!(
                        op = op.kind(),
                        path = %op.path(),
                        error = %e,
                        "Topic store rejected operation, skipping"
                    );
                    summary.rejected += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }

        summary.batches += 1;
        summary.committed_offset = batch.end_offset;
        debug!(offset = summary.committed_offset, "Acknowledged batch");

        if summary.batches % 100 == 0 {
            info!(
                batches = summary.batches,
                offset = summary.committed_offset,
                applied = summary.applied,
                "Progress"
            );
        }
    }

    sessions.close().await;
    summary.stats = router.stats().clone();

    info!(
        batches = summary.batches,
        offset = summary.committed_offset,
        envelopes = summary.stats.envelopes,
        projected = summary.stats.projected,
        skipped = summary.stats.skipped(),
        applied = summary.applied,
        rejected = summary.rejected,
        interrupted = summary.interrupted,
        "Pipeline stopped"
    );

    Ok(summary)
}
