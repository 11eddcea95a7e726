//! Per-file rows and per-commit rollups derived from a record.
//!
//! Added files count only their added lines, removed files only their
//! removed lines, and modified files both. Language rows follow the same
//! rule, so they always sum to the commit totals.

use std::collections::BTreeMap;

use crate::classify::{detect_language, file_extension, file_name};
use crate::store::{FileRow, LanguageRow};
use crate::types::{ChangeKind, CommitRecord};

/// Everything derived from one record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rollup {
    pub files: Vec<FileRow>,
    pub languages: Vec<LanguageRow>,
    pub total_added_lines: i64,
    pub total_removed_lines: i64,
    pub total_changed_files: i64,
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Lines a file contributes to the rollups, by change kind.
fn contribution(kind: ChangeKind, added: i64, removed: i64) -> (i64, i64) {
    match kind {
        ChangeKind::Added => (added, 0),
        ChangeKind::Modified => (added, removed),
        ChangeKind::Removed => (0, removed),
    }
}

/// Builds one file row per touched path, in added, modified, removed order.
pub fn file_rows(record: &CommitRecord) -> Vec<FileRow> {
    record
        .changed_paths()
        .map(|(path, kind)| {
            let stat = record.stat_for(path);
            FileRow {
                file_path: path.to_string(),
                file_name: file_name(path).to_string(),
                file_extension: file_extension(path).to_string(),
                change_type: kind,
                added_lines: saturating_i64(stat.added_lines),
                removed_lines: saturating_i64(stat.removed_lines),
                language: detect_language(path).to_string(),
            }
        })
        .collect()
}

/// Computes file rows, language rows and commit totals for a record.
///
/// Language rows are sorted by language name.
pub fn rollup(record: &CommitRecord) -> Rollup {
    let files = file_rows(record);

    let mut total_added = 0i64;
    let mut total_removed = 0i64;
    let mut by_language: BTreeMap<&str, LanguageRow> = BTreeMap::new();

    for file in &files {
        let (added, removed) = contribution(file.change_type, file.added_lines, file.removed_lines);
        total_added = total_added.saturating_add(added);
        total_removed = total_removed.saturating_add(removed);

        let entry = by_language
            .entry(file.language.as_str())
            .or_insert_with(|| LanguageRow {
                language: file.language.clone(),
                added_lines: 0,
                removed_lines: 0,
                file_count: 0,
            });
        entry.added_lines = entry.added_lines.saturating_add(added);
        entry.removed_lines = entry.removed_lines.saturating_add(removed);
        entry.file_count += 1;
    }

    let languages = by_language.into_values().collect();
    let total_changed_files = files.len() as i64;

    Rollup {
        files,
        languages,
        total_added_lines: total_added,
        total_removed_lines: total_removed,
        total_changed_files,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FileStat;
    use proptest::prelude::*;
    use std::collections::HashMap;

    fn record_with(
        added: &[&str],
        modified: &[&str],
        removed: &[&str],
        stats: &[(&str, u64, u64)],
    ) -> CommitRecord {
        let mut record = CommitRecord::new("c1");
        record.added = added.iter().map(|s| s.to_string()).collect();
        record.modified = modified.iter().map(|s| s.to_string()).collect();
        record.removed = removed.iter().map(|s| s.to_string()).collect();
        if !stats.is_empty() {
            record.file_stats = Some(
                stats
                    .iter()
                    .map(|(path, a, r)| (path.to_string(), FileStat::new(*a, *r)))
                    .collect::<HashMap<_, _>>(),
            );
        }
        record
    }

    #[test]
    fn added_file_without_stats() {
        let rollup = rollup(&record_with(&["app.py"], &[], &[], &[]));

        assert_eq!(rollup.files.len(), 1);
        assert_eq!(rollup.files[0].file_name, "app.py");
        assert_eq!(rollup.files[0].file_extension, "py");
        assert_eq!(rollup.files[0].change_type, ChangeKind::Added);
        assert_eq!(
            rollup.languages,
            vec![LanguageRow {
                language: "python".into(),
                added_lines: 0,
                removed_lines: 0,
                file_count: 1,
            }]
        );
        assert_eq!(rollup.total_changed_files, 1);
    }

    #[test]
    fn change_kind_decides_contribution() {
        let record = record_with(
            &["new.rs"],
            &["lib.rs"],
            &["old.rs"],
            &[("new.rs", 10, 99), ("lib.rs", 4, 2), ("old.rs", 99, 7)],
        );
        let rollup = rollup(&record);

        assert_eq!(rollup.total_added_lines, 14);
        assert_eq!(rollup.total_removed_lines, 9);
        assert_eq!(rollup.total_changed_files, 3);

        // File rows keep the stats as supplied.
        assert_eq!(rollup.files[0].removed_lines, 99);
        assert_eq!(rollup.files[2].added_lines, 99);

        assert_eq!(
            rollup.languages,
            vec![LanguageRow {
                language: "rust".into(),
                added_lines: 14,
                removed_lines: 9,
                file_count: 3,
            }]
        );
    }

    #[test]
    fn languages_are_grouped_and_sorted() {
        let record = record_with(
            &["web/app.ts", "README"],
            &["main.go", "util.go"],
            &[],
            &[("web/app.ts", 3, 0), ("main.go", 2, 1), ("util.go", 5, 5)],
        );
        let rollup = rollup(&record);

        let names: Vec<_> = rollup.languages.iter().map(|l| l.language.as_str()).collect();
        assert_eq!(names, vec!["go", "typescript", "unknown"]);
        assert_eq!(rollup.languages[0].file_count, 2);
        assert_eq!(rollup.languages[0].added_lines, 7);
        assert_eq!(rollup.languages[0].removed_lines, 6);
    }

    #[test]
    fn empty_record_has_no_rows() {
        let rollup = rollup(&CommitRecord::new("c1"));
        assert_eq!(rollup, Rollup::default());
    }

    proptest! {
        #[test]
        fn prop_languages_sum_to_totals(
            files in prop::collection::vec(
                ("[a-z]{1,6}\\.(rs|py|go|md|txt)", 0u8..3, 0u64..1000, 0u64..1000),
                0..20,
            )
        ) {
            let mut record = CommitRecord::new("c1");
            let mut stats = HashMap::new();
            for (path, kind, added, removed) in &files {
                match kind {
                    0 => record.added.push(path.clone()),
                    1 => record.modified.push(path.clone()),
                    _ => record.removed.push(path.clone()),
                }
                stats.insert(path.clone(), FileStat::new(*added, *removed));
            }
            record.file_stats = Some(stats);

            let rollup = rollup(&record);
            let added: i64 = rollup.languages.iter().map(|l| l.added_lines).sum();
            let removed: i64 = rollup.languages.iter().map(|l| l.removed_lines).sum();
            let count: i64 = rollup.languages.iter().map(|l| l.file_count).sum();

            prop_assert_eq!(added, rollup.total_added_lines);
            prop_assert_eq!(removed, rollup.total_removed_lines);
            prop_assert_eq!(count, rollup.total_changed_files);
            prop_assert_eq!(rollup.files.len(), files.len());
        }
    }
}
