//! Row shapes written to and read from the store.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::{ChangeKind, CommitRecord};

/// A commit ready for insertion, with its timestamps resolved and its
/// rollups computed.
#[derive(Debug, Clone)]
pub struct NewCommit<'a> {
    pub record: &'a CommitRecord,
    pub timestamp: DateTime<Utc>,
    pub authored_date: DateTime<Utc>,
    pub committed_date: DateTime<Utc>,
    pub total_added_lines: i64,
    pub total_removed_lines: i64,
    pub total_changed_files: i64,
}

/// One touched file of a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRow {
    pub file_path: String,
    pub file_name: String,
    pub file_extension: String,
    pub change_type: ChangeKind,
    pub added_lines: i64,
    pub removed_lines: i64,
    pub language: String,
}

/// Per-language sums over one commit's files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LanguageRow {
    pub language: String,
    pub added_lines: i64,
    pub removed_lines: i64,
    pub file_count: i64,
}

/// A persisted commit as listed by the read API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommitSummary {
    pub id: i64,
    pub commit_id: String,
    pub project_id: Option<i64>,
    pub project_name: String,
    pub branch: String,
    pub title: String,
    pub author: String,
    pub author_email: String,
    pub timestamp: DateTime<Utc>,
    pub url: String,
    pub total_added_lines: i64,
    pub total_removed_lines: i64,
    pub total_changed_files: i64,
}

/// A persisted commit together with its file and language rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredCommit {
    pub summary: CommitSummary,
    pub files: Vec<FileRow>,
    pub languages: Vec<LanguageRow>,
}

/// Totals over a member's commits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MemberStats {
    pub commit_count: i64,
    pub total_added: i64,
    pub total_removed: i64,
    pub total_files: i64,
}

/// Totals for one language over a member's commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LanguageStats {
    pub language: String,
    pub total_added: i64,
    pub total_removed: i64,
    pub total_files: i64,
}

/// A half-open `[start, end)` filter on commit timestamps. Either side may
/// be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        DateRange { start, end }
    }

    /// An unbounded range.
    pub fn all() -> Self {
        DateRange::default()
    }
}
