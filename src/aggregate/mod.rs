//! Idempotent, transactional persistence of commit records.
//!
//! For each record the aggregator checks whether `(commit_id, project_id)`
//! is already stored, resolves timestamps, derives file and language rows,
//! and writes everything in one transaction. Re-recording a stored commit is
//! a [`RecordOutcome::Duplicate`], not an error.

pub mod rollup;
pub mod timestamp;

use sqlx::{Sqlite, Transaction};
use tracing::{debug, info, instrument};

use crate::store::{
    CommitSummary, DateRange, LanguageStats, MemberStats, NewCommit, Store, StoreError,
};
use crate::types::CommitRecord;

pub use rollup::{Rollup, rollup};
pub use timestamp::{parse_timestamp, resolve_timestamp};

/// Result of recording one commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// The commit was inserted under this row id.
    Recorded { row_id: i64 },

    /// The commit was already stored; nothing was written.
    Duplicate,
}

/// Result of recording a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub recorded: usize,
    pub duplicates: usize,
}

/// Writes commit records to a [`Store`].
#[derive(Debug, Clone)]
pub struct CommitAggregator {
    store: Store,
}

impl CommitAggregator {
    pub fn new(store: Store) -> Self {
        CommitAggregator { store }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Records one commit in its own transaction.
    #[instrument(skip(self, record), fields(commit_id = %record.commit_id, project_id = ?record.project_id))]
    pub async fn record_commit(&self, record: &CommitRecord) -> Result<RecordOutcome, StoreError> {
        let mut tx = self.store.begin().await?;
        let outcome = record_in_tx(&mut tx, record).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    /// Records every commit in one transaction. Any failure rolls back the
    /// whole batch.
    #[instrument(skip(self, records), fields(count = records.len()))]
    pub async fn record_batch(&self, records: &[CommitRecord]) -> Result<BatchOutcome, StoreError> {
        let mut tx = self.store.begin().await?;
        let mut outcome = BatchOutcome::default();

        for record in records {
            match record_in_tx(&mut tx, record).await? {
                RecordOutcome::Recorded { .. } => outcome.recorded += 1,
                RecordOutcome::Duplicate => outcome.duplicates += 1,
            }
        }

        tx.commit().await?;
        info!(
            recorded = outcome.recorded,
            duplicates = outcome.duplicates,
            "Batch recorded"
        );
        Ok(outcome)
    }

    pub async fn member_commits(
        &self,
        author_email: &str,
        range: DateRange,
    ) -> Result<Vec<CommitSummary>, StoreError> {
        self.store.member_commits(author_email, range).await
    }

    pub async fn member_stats(
        &self,
        author_email: &str,
        range: DateRange,
    ) -> Result<MemberStats, StoreError> {
        self.store.member_stats(author_email, range).await
    }

    pub async fn language_stats(
        &self,
        author_email: &str,
        range: DateRange,
    ) -> Result<Vec<LanguageStats>, StoreError> {
        self.store.language_stats(author_email, range).await
    }
}

async fn record_in_tx(
    tx: &mut Transaction<'_, Sqlite>,
    record: &CommitRecord,
) -> Result<RecordOutcome, StoreError> {
    if Store::commit_exists_in_tx(tx, &record.commit_id, record.project_id).await? {
        debug!(
            commit_id = %record.commit_id,
            project_id = ?record.project_id,
            "Commit already recorded, skipping"
        );
        return Ok(RecordOutcome::Duplicate);
    }

    let timestamp = resolve_timestamp(&record.commit_id, &record.timestamp);
    let rollup = rollup(record);
    let commit = NewCommit {
        record,
        timestamp,
        authored_date: record.authored_at.unwrap_or(timestamp),
        committed_date: record.committed_at.unwrap_or(timestamp),
        total_added_lines: rollup.total_added_lines,
        total_removed_lines: rollup.total_removed_lines,
        total_changed_files: rollup.total_changed_files,
    };

    let row_id = Store::insert_commit_in_tx(tx, &commit, &rollup.files, &rollup.languages).await?;

    info!(
        commit_id = %record.commit_id,
        project_id = ?record.project_id,
        added_lines = rollup.total_added_lines,
        removed_lines = rollup.total_removed_lines,
        files = rollup.total_changed_files,
        "Commit recorded"
    );
    Ok(RecordOutcome::Recorded { row_id })
}
