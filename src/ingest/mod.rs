//! Ingestion orchestrator.
//!
//! Turns one webhook delivery into pool work: classify the event, parse the
//! payload into records, wrap them in a task and submit it. When the pool
//! cannot take the task the work runs inline on the caller instead, so a
//! delivery is never dropped for lack of capacity.

pub mod tasks;

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use crate::aggregate::CommitAggregator;
use crate::platform::{Platform, PushKind};
use crate::pool::{Task, WorkerPool};

pub use tasks::{BatchRecordTask, RecordCommitTask};

/// What happened to a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The event type carries no commits of interest.
    Ignored,

    /// The event was a push, but yielded no records.
    Empty,

    /// Records were handed off. `deferred` is true when a pool worker will
    /// persist them and false when they were persisted inline.
    Processed { records: usize, deferred: bool },
}

impl IngestOutcome {
    /// Number of records extracted from the delivery.
    pub fn records(&self) -> usize {
        match self {
            IngestOutcome::Processed { records, .. } => *records,
            IngestOutcome::Ignored | IngestOutcome::Empty => 0,
        }
    }
}

/// Routes parsed deliveries to the worker pool.
#[derive(Clone)]
pub struct Ingestor {
    pool: Arc<WorkerPool>,
    aggregator: CommitAggregator,
}

impl Ingestor {
    pub fn new(pool: Arc<WorkerPool>, aggregator: CommitAggregator) -> Self {
        Ingestor { pool, aggregator }
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    pub fn aggregator(&self) -> &CommitAggregator {
        &self.aggregator
    }

    /// Ingests one delivery.
    #[instrument(skip(self, payload), fields(platform = %platform, event_type = %event_type))]
    pub async fn ingest(&self, platform: Platform, event_type: &str, payload: &Value) -> IngestOutcome {
        let records = match platform.push_event_kind(event_type, payload) {
            Some(PushKind::Push) => platform.parse_push_event(payload),
            Some(PushKind::TagPush) => platform.parse_tag_push_event(payload),
            None => {
                debug!("Ignoring event");
                return IngestOutcome::Ignored;
            }
        };

        let count = records.len();
        if count == 0 {
            debug!("Push carried no commits");
            return IngestOutcome::Empty;
        }

        let task: Arc<dyn Task> = match <[_; 1]>::try_from(records) {
            Ok([record]) => Arc::new(RecordCommitTask::new(self.aggregator.clone(), record)),
            Err(records) => Arc::new(BatchRecordTask::new(self.aggregator.clone(), records)),
        };
        let task_id = task.id();

        match self.pool.submit(Arc::clone(&task)) {
            Ok(()) => {
                info!(task_id = %task_id, records = count, "Submitted to worker pool");
                IngestOutcome::Processed {
                    records: count,
                    deferred: true,
                }
            }
            Err(e) => {
                warn!(task_id = %task_id, error = %e, "Pool rejected task, processing inline");
                if let Err(e) = task.execute().await {
                    error!(task_id = %task_id, error = %e, "Inline processing failed");
                }
                IngestOutcome::Processed {
                    records: count,
                    deferred: false,
                }
            }
        }
    }
}
