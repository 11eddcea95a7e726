//! The canonical, platform-agnostic commit record.
//!
//! Every platform adapter produces [`CommitRecord`] values; the aggregator
//! consumes them. Nothing downstream of the adapter knows which vendor a
//! record came from.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::classify::parse_diff_stats;

/// Placeholder used for author and committer identities the payload omits.
pub const UNKNOWN_IDENTITY: &str = "unknown";

/// Maximum length of a commit title, in characters.
pub const MAX_TITLE_CHARS: usize = 255;

/// How a file was touched by a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

impl ChangeKind {
    /// Returns the value stored in the `change_type` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Added => "added",
            ChangeKind::Modified => "modified",
            ChangeKind::Removed => "removed",
        }
    }
}

impl FromStr for ChangeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "added" => Ok(ChangeKind::Added),
            "modified" => Ok(ChangeKind::Modified),
            "removed" => Ok(ChangeKind::Removed),
            other => Err(format!("unknown change type: {other}")),
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Added/removed line counts for a single path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStat {
    pub added_lines: u64,
    pub removed_lines: u64,
}

impl FileStat {
    pub fn new(added_lines: u64, removed_lines: u64) -> Self {
        FileStat {
            added_lines,
            removed_lines,
        }
    }

    /// Builds a stat from the unified diff of one file.
    pub fn from_diff(diff: &str) -> Self {
        let (added_lines, removed_lines) = parse_diff_stats(diff);
        FileStat {
            added_lines,
            removed_lines,
        }
    }
}

/// Descriptive project fields shared by every commit of a push.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub name: String,
    pub path: String,
    pub description: String,
    pub web_url: String,
    pub namespace: String,
    pub visibility_level: Option<i64>,
    pub default_branch: String,
    pub git_ssh_url: String,
    pub git_http_url: String,
}

/// Descriptive repository fields shared by every commit of a push.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryInfo {
    pub name: String,
    pub url: String,
    pub description: String,
    pub homepage: String,
    pub git_ssh_url: String,
    pub git_http_url: String,
    pub visibility_level: Option<i64>,
}

/// Push-level fields: the ref update and who performed it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushInfo {
    pub before_sha: String,
    pub after_sha: String,
    pub checkout_sha: String,
    pub message: String,
    pub total_commits_count: i64,
    pub user_id: Option<i64>,
    pub user_name: String,
    pub user_username: String,
    pub user_email: String,
}

/// One commit extracted from a push payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub commit_id: String,
    pub project_id: Option<i64>,

    pub message: String,
    pub title: String,
    /// The vendor's timestamp string, unparsed.
    pub timestamp: String,

    pub author_name: String,
    pub author_email: String,
    pub committer_name: String,
    pub committer_email: String,

    pub authored_at: Option<DateTime<Utc>>,
    pub committed_at: Option<DateTime<Utc>>,

    pub branch: String,
    pub ref_protected: Option<bool>,
    pub url: String,

    pub project: ProjectInfo,
    pub repository: RepositoryInfo,
    pub push: PushInfo,

    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub removed: Vec<String>,

    /// Per-path line counts, when the source supplies them.
    pub file_stats: Option<HashMap<String, FileStat>>,
}

impl CommitRecord {
    /// Creates a record with the given id and every other field defaulted.
    pub fn new(commit_id: impl Into<String>) -> Self {
        CommitRecord {
            commit_id: commit_id.into(),
            project_id: None,
            message: String::new(),
            title: String::new(),
            timestamp: String::new(),
            author_name: UNKNOWN_IDENTITY.to_string(),
            author_email: UNKNOWN_IDENTITY.to_string(),
            committer_name: UNKNOWN_IDENTITY.to_string(),
            committer_email: UNKNOWN_IDENTITY.to_string(),
            authored_at: None,
            committed_at: None,
            branch: String::new(),
            ref_protected: None,
            url: String::new(),
            project: ProjectInfo::default(),
            repository: RepositoryInfo::default(),
            push: PushInfo::default(),
            added: Vec::new(),
            modified: Vec::new(),
            removed: Vec::new(),
            file_stats: None,
        }
    }

    /// Returns the line stat for `path`, or zeros when none was supplied.
    pub fn stat_for(&self, path: &str) -> FileStat {
        self.file_stats
            .as_ref()
            .and_then(|stats| stats.get(path))
            .copied()
            .unwrap_or_default()
    }

    /// Iterates over every touched path with its change kind, in
    /// added, modified, removed order.
    pub fn changed_paths(&self) -> impl Iterator<Item = (&str, ChangeKind)> {
        let added = self.added.iter().map(|p| (p.as_str(), ChangeKind::Added));
        let modified = self
            .modified
            .iter()
            .map(|p| (p.as_str(), ChangeKind::Modified));
        let removed = self
            .removed
            .iter()
            .map(|p| (p.as_str(), ChangeKind::Removed));
        added.chain(modified).chain(removed)
    }
}

/// Derives a commit title: the message up to the first newline, capped at
/// [`MAX_TITLE_CHARS`] characters.
pub fn derive_title(message: &str) -> String {
    let first_line = message.split('\n').next().unwrap_or_default();
    let first_line = first_line.strip_suffix('\r').unwrap_or(first_line);
    first_line.chars().take(MAX_TITLE_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_is_first_line() {
        assert_eq!(derive_title("Fix parser\n\nLonger body"), "Fix parser");
        assert_eq!(derive_title("single line"), "single line");
        assert_eq!(derive_title("windows\r\nbody"), "windows");
        assert_eq!(derive_title(""), "");
    }

    #[test]
    fn title_is_truncated_by_characters() {
        let long = "é".repeat(300);
        let title = derive_title(&long);
        assert_eq!(title.chars().count(), MAX_TITLE_CHARS);
    }

    #[test]
    fn stat_for_defaults_to_zero() {
        let mut record = CommitRecord::new("abc");
        assert_eq!(record.stat_for("app.py"), FileStat::default());

        let mut stats = HashMap::new();
        stats.insert("app.py".to_string(), FileStat::new(4, 1));
        record.file_stats = Some(stats);
        assert_eq!(record.stat_for("app.py"), FileStat::new(4, 1));
        assert_eq!(record.stat_for("other.py"), FileStat::default());
    }

    #[test]
    fn file_stat_from_diff() {
        let stat = FileStat::from_diff("@@ -1,2 +1,2 @@\n-a\n+b\n+c\n ctx\n");
        assert_eq!(stat, FileStat::new(2, 1));
    }

    #[test]
    fn changed_paths_orders_by_kind() {
        let mut record = CommitRecord::new("abc");
        record.removed = vec!["gone.rs".into()];
        record.added = vec!["new.rs".into()];
        record.modified = vec!["lib.rs".into()];

        let paths: Vec<_> = record.changed_paths().collect();
        assert_eq!(
            paths,
            vec![
                ("new.rs", ChangeKind::Added),
                ("lib.rs", ChangeKind::Modified),
                ("gone.rs", ChangeKind::Removed),
            ]
        );
    }

    #[test]
    fn change_kind_display() {
        assert_eq!(ChangeKind::Added.to_string(), "added");
        assert_eq!(ChangeKind::Modified.to_string(), "modified");
        assert_eq!(ChangeKind::Removed.to_string(), "removed");
    }

    #[test]
    fn change_kind_parses_column_values() {
        for kind in [ChangeKind::Added, ChangeKind::Modified, ChangeKind::Removed] {
            assert_eq!(kind.as_str().parse::<ChangeKind>(), Ok(kind));
        }
        assert!("renamed".parse::<ChangeKind>().is_err());
    }
}
