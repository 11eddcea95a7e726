//! Pool tasks that hand records to the aggregator.

use async_trait::async_trait;

use crate::aggregate::CommitAggregator;
use crate::pool::{Task, TaskError};
use crate::types::CommitRecord;

/// Records a single commit.
pub struct RecordCommitTask {
    aggregator: CommitAggregator,
    record: CommitRecord,
}

impl RecordCommitTask {
    pub fn new(aggregator: CommitAggregator, record: CommitRecord) -> Self {
        RecordCommitTask { aggregator, record }
    }
}

#[async_trait]
impl Task for RecordCommitTask {
    async fn execute(&self) -> Result<(), TaskError> {
        self.aggregator.record_commit(&self.record).await?;
        Ok(())
    }

    fn id(&self) -> String {
        format!("commit-{}", self.record.commit_id)
    }
}

/// Records every commit of a push in one transaction.
pub struct BatchRecordTask {
    aggregator: CommitAggregator,
    records: Vec<CommitRecord>,
}

impl BatchRecordTask {
    pub fn new(aggregator: CommitAggregator, records: Vec<CommitRecord>) -> Self {
        BatchRecordTask {
            aggregator,
            records,
        }
    }
}

#[async_trait]
impl Task for BatchRecordTask {
    async fn execute(&self) -> Result<(), TaskError> {
        self.aggregator.record_batch(&self.records).await?;
        Ok(())
    }

    fn id(&self) -> String {
        match self.records.first() {
            Some(first) => format!("batch-{}-{}", first.commit_id, self.records.len()),
            None => "batch-empty".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    #[tokio::test]
    async fn task_ids_name_the_commits() {
        let aggregator = CommitAggregator::new(Store::in_memory().await.unwrap());

        let single = RecordCommitTask::new(aggregator.clone(), CommitRecord::new("abc"));
        assert_eq!(single.id(), "commit-abc");

        let batch = BatchRecordTask::new(
            aggregator.clone(),
            vec![CommitRecord::new("abc"), CommitRecord::new("def")],
        );
        assert_eq!(batch.id(), "batch-abc-2");

        let empty = BatchRecordTask::new(aggregator, Vec::new());
        assert_eq!(empty.id(), "batch-empty");
    }

    #[tokio::test]
    async fn executing_twice_is_idempotent() {
        let store = Store::in_memory().await.unwrap();
        let aggregator = CommitAggregator::new(store.clone());
        let task = BatchRecordTask::new(
            aggregator,
            vec![CommitRecord::new("abc"), CommitRecord::new("def")],
        );

        task.execute().await.unwrap();
        task.execute().await.unwrap();
        assert_eq!(store.commit_count().await.unwrap(), 2);
    }
}
