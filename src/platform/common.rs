//! Wire-schema building blocks shared by the platform variants.
//!
//! Vendor payloads are only partially documented and drift between versions,
//! so every field is deserialized leniently: a missing field, an explicit
//! `null`, or a value of the wrong JSON type all read as "absent" instead of
//! failing the whole payload.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::types::{
    CommitRecord, ProjectInfo, PushInfo, RepositoryInfo, UNKNOWN_IDENTITY, derive_title,
};

/// A field that reads as `None` when absent or of the wrong type.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Lenient<T>(pub Option<T>);

impl<T> Default for Lenient<T> {
    fn default() -> Self {
        Lenient(None)
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Lenient<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Lenient(T::deserialize(value).ok()))
    }
}

impl<T> Lenient<T> {
    pub fn into_inner(self) -> Option<T> {
        self.0
    }
}

impl Lenient<String> {
    /// Returns the string, or an empty string when absent.
    pub fn or_empty(self) -> String {
        self.0.unwrap_or_default()
    }

    /// Returns the string if present and non-empty.
    pub fn non_empty(self) -> Option<String> {
        self.0.filter(|s| !s.is_empty())
    }
}

/// A list of paths. Non-arrays read as empty; non-string elements are skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct PathList(pub Vec<String>);

impl<'de> Deserialize<'de> for PathList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let paths = match Value::deserialize(deserializer)? {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };
        Ok(PathList(paths))
    }
}

/// The `commits` array of a push. Non-arrays read as empty; entries that are
/// not objects are skipped but still counted in `len`.
#[derive(Debug, Clone, Default)]
pub(crate) struct CommitList {
    pub entries: Vec<RawCommit>,
    /// Length of the array as delivered.
    pub len: usize,
}

impl<'de> Deserialize<'de> for CommitList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let Value::Array(items) = Value::deserialize(deserializer)? else {
            return Ok(CommitList::default());
        };
        let len = items.len();
        let entries = items
            .into_iter()
            .filter(Value::is_object)
            .filter_map(|item| RawCommit::deserialize(item).ok())
            .collect();
        Ok(CommitList { entries, len })
    }
}

/// A person as it appears in commit entries and pusher objects.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RawPerson {
    pub name: Lenient<String>,
    pub email: Lenient<String>,
    pub login: Lenient<String>,
}

/// One entry of the `commits` array. All three vendors share this shape.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RawCommit {
    pub id: Lenient<String>,
    pub sha: Lenient<String>,
    pub message: Lenient<String>,
    pub timestamp: Lenient<String>,
    pub url: Lenient<String>,
    pub author: Lenient<RawPerson>,
    pub committer: Lenient<RawPerson>,
    pub added: PathList,
    pub modified: PathList,
    pub removed: PathList,
}

/// Per-vendor differences in how commit entries are read.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CommitRules {
    /// Whether `sha` is consulted when `id` is missing or empty.
    pub sha_fallback: bool,
    /// Layouts tried after RFC 3339, interpreted as UTC.
    pub time_layouts: &'static [&'static str],
}

/// Push-level fields merged into every record of a push.
#[derive(Debug, Clone, Default)]
pub(crate) struct PushMeta {
    pub project_id: Option<i64>,
    pub branch: String,
    pub ref_protected: Option<bool>,
    pub project: ProjectInfo,
    pub repository: RepositoryInfo,
    pub push: PushInfo,
}

/// Strips `refs/heads/` from a ref; any other ref is returned verbatim.
pub(crate) fn branch_from_ref(git_ref: &str) -> String {
    git_ref
        .strip_prefix("refs/heads/")
        .unwrap_or(git_ref)
        .to_string()
}

/// Parses a commit timestamp: RFC 3339 first, then each fallback layout.
pub(crate) fn parse_commit_time(timestamp: &str, layouts: &[&str]) -> Option<DateTime<Utc>> {
    if timestamp.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(timestamp) {
        return Some(parsed.with_timezone(&Utc));
    }
    layouts.iter().find_map(|layout| {
        NaiveDateTime::parse_from_str(timestamp, layout)
            .ok()
            .map(|naive| naive.and_utc())
    })
}

/// Maps a boolean "is public" flag onto GitLab's visibility levels.
pub(crate) fn visibility_from_public(public: bool) -> i64 {
    if public { 20 } else { 0 }
}

/// Converts every commit entry into a record, dropping entries without an id.
pub(crate) fn build_records(
    meta: &PushMeta,
    commits: Vec<RawCommit>,
    rules: CommitRules,
) -> Vec<CommitRecord> {
    commits
        .into_iter()
        .filter_map(|raw| build_record(meta, raw, rules))
        .collect()
}

fn build_record(meta: &PushMeta, raw: RawCommit, rules: CommitRules) -> Option<CommitRecord> {
    let mut commit_id = raw.id.non_empty();
    if commit_id.is_none() && rules.sha_fallback {
        commit_id = raw.sha.non_empty();
    }
    let commit_id = commit_id?;

    let message = raw.message.or_empty();
    let timestamp = raw.timestamp.or_empty();
    let parsed_time = parse_commit_time(&timestamp, rules.time_layouts);

    let author = raw.author.into_inner().unwrap_or_default();
    let author_name = author
        .name
        .non_empty()
        .unwrap_or_else(|| UNKNOWN_IDENTITY.to_string());
    let author_email = author
        .email
        .non_empty()
        .unwrap_or_else(|| UNKNOWN_IDENTITY.to_string());

    let (committer_name, committer_email) = match raw.committer.into_inner() {
        Some(committer) => (
            committer.name.non_empty().unwrap_or_else(|| author_name.clone()),
            committer
                .email
                .non_empty()
                .unwrap_or_else(|| author_email.clone()),
        ),
        None => (author_name.clone(), author_email.clone()),
    };

    Some(CommitRecord {
        commit_id,
        project_id: meta.project_id,
        title: derive_title(&message),
        message,
        timestamp,
        author_name,
        author_email,
        committer_name,
        committer_email,
        authored_at: parsed_time,
        committed_at: parsed_time,
        branch: meta.branch.clone(),
        ref_protected: meta.ref_protected,
        url: raw.url.or_empty(),
        project: meta.project.clone(),
        repository: meta.repository.clone(),
        push: meta.push.clone(),
        added: raw.added.0,
        modified: raw.modified.0,
        removed: raw.removed.0,
        file_stats: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    const RULES: CommitRules = CommitRules {
        sha_fallback: true,
        time_layouts: &["%Y-%m-%d %H:%M:%S"],
    };

    #[test]
    fn lenient_reads_wrong_type_as_none() {
        #[derive(Deserialize, Default)]
        #[serde(default)]
        struct Sample {
            name: Lenient<String>,
            count: Lenient<i64>,
        }

        let sample: Sample = serde_json::from_value(json!({"name": 42, "count": "x"})).unwrap();
        assert_eq!(sample.name.0, None);
        assert_eq!(sample.count.0, None);

        let sample: Sample = serde_json::from_value(json!({"name": "ok", "count": 3})).unwrap();
        assert_eq!(sample.name.0.as_deref(), Some("ok"));
        assert_eq!(sample.count.0, Some(3));

        let sample: Sample = serde_json::from_value(json!({"name": null})).unwrap();
        assert_eq!(sample.name.0, None);
    }

    #[test]
    fn path_list_skips_non_strings() {
        let list: PathList = serde_json::from_value(json!(["a.rs", 1, null, "b.rs"])).unwrap();
        assert_eq!(list.0, vec!["a.rs", "b.rs"]);

        let list: PathList = serde_json::from_value(json!("a.rs")).unwrap();
        assert!(list.0.is_empty());
    }

    #[test]
    fn commit_list_skips_non_objects() {
        let list: CommitList =
            serde_json::from_value(json!([{"id": "a"}, "junk", 7, {"id": "b"}])).unwrap();
        assert_eq!(list.entries.len(), 2);
        assert_eq!(list.len, 4);

        let list: CommitList = serde_json::from_value(json!({"id": "a"})).unwrap();
        assert!(list.entries.is_empty());
        assert_eq!(list.len, 0);
    }

    #[test]
    fn branch_strips_heads_prefix_only() {
        assert_eq!(branch_from_ref("refs/heads/main"), "main");
        assert_eq!(branch_from_ref("refs/heads/feature/x"), "feature/x");
        assert_eq!(branch_from_ref("refs/tags/v1.0"), "refs/tags/v1.0");
        assert_eq!(branch_from_ref("main"), "main");
    }

    #[test]
    fn commit_time_layouts() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();

        assert_eq!(
            parse_commit_time("2024-03-01T12:30:00Z", &[]),
            Some(expected)
        );
        assert_eq!(
            parse_commit_time("2024-03-01T20:30:00+08:00", &[]),
            Some(expected)
        );
        assert_eq!(
            parse_commit_time("2024-03-01 12:30:00", RULES.time_layouts),
            Some(expected)
        );
        assert_eq!(parse_commit_time("2024-03-01 12:30:00", &[]), None);
        assert_eq!(parse_commit_time("yesterday", RULES.time_layouts), None);
        assert_eq!(parse_commit_time("", RULES.time_layouts), None);
    }

    #[test]
    fn record_identity_defaults() {
        let raw: RawCommit = serde_json::from_value(json!({
            "id": "c1",
            "message": "Subject\n\nBody",
        }))
        .unwrap();

        let record = build_record(&PushMeta::default(), raw, RULES).unwrap();
        assert_eq!(record.title, "Subject");
        assert_eq!(record.author_name, UNKNOWN_IDENTITY);
        assert_eq!(record.author_email, UNKNOWN_IDENTITY);
        assert_eq!(record.committer_name, UNKNOWN_IDENTITY);
        assert!(record.authored_at.is_none());
        assert!(record.committed_at.is_none());
    }

    #[test]
    fn committer_defaults_to_author() {
        let raw: RawCommit = serde_json::from_value(json!({
            "id": "c1",
            "author": {"name": "Ada", "email": "ada@example.com"},
            "committer": {"name": "Bot"},
        }))
        .unwrap();

        let record = build_record(&PushMeta::default(), raw, RULES).unwrap();
        assert_eq!(record.author_name, "Ada");
        assert_eq!(record.committer_name, "Bot");
        assert_eq!(record.committer_email, "ada@example.com");
    }

    #[test]
    fn sha_fallback_follows_rules() {
        let entry = json!({"sha": "from-sha"});

        let raw: RawCommit = serde_json::from_value(entry.clone()).unwrap();
        let record = build_record(&PushMeta::default(), raw, RULES).unwrap();
        assert_eq!(record.commit_id, "from-sha");

        let strict = CommitRules {
            sha_fallback: false,
            time_layouts: &[],
        };
        let raw: RawCommit = serde_json::from_value(entry).unwrap();
        assert!(build_record(&PushMeta::default(), raw, strict).is_none());
    }

    #[test]
    fn empty_id_is_dropped() {
        let commits: CommitList =
            serde_json::from_value(json!([{"id": ""}, {"message": "no id"}, {"id": "keep"}]))
                .unwrap();
        let records = build_records(&PushMeta::default(), commits.entries, RULES);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].commit_id, "keep");
    }
}
