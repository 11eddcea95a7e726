//! Line counting for unified diffs.
//!
//! A unified diff marks added lines with `+` and removed lines with `-`.
//! File headers (`+++ b/path`, `--- a/path`), hunk headers (`@@ ... @@`) and
//! context lines (leading space) carry no change and are never counted.

/// Counts added and removed lines in unified-diff text.
///
/// Returns `(added, removed)`. The scan is a single pass over the lines and
/// is pure: the same input always yields the same counts.
///
/// # Examples
///
/// ```
/// use commit_ledger::classify::parse_diff_stats;
///
/// let diff = "@@ -1,2 +1,3 @@\n unchanged\n+new line\n-old line\n";
/// assert_eq!(parse_diff_stats(diff), (1, 1));
/// ```
pub fn parse_diff_stats(diff: &str) -> (u64, u64) {
    let mut added = 0;
    let mut removed = 0;

    for line in diff.lines() {
        if line.is_empty() || line.starts_with(' ') || line.starts_with("@@") {
            continue;
        }
        if line.starts_with("+++") || line.starts_with("---") {
            continue;
        }

        match line.as_bytes()[0] {
            b'+' => added += 1,
            b'-' => removed += 1,
            _ => {}
        }
    }

    (added, removed)
}
