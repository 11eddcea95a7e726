//! File-path classification by extension.

/// Language tag for paths without a recognized extension.
pub const UNKNOWN_LANGUAGE: &str = "unknown";

/// Maps a lower-cased extension to its language tag.
fn language_for_extension(ext: &str) -> Option<&'static str> {
    let language = match ext {
        "go" => "go",
        "java" => "java",
        "js" | "jsx" => "javascript",
        "ts" | "tsx" => "typescript",
        "vue" => "vue",
        "py" | "pyw" | "pyc" => "python",
        "c" | "h" => "c",
        "cpp" | "cc" | "cxx" | "hpp" => "cpp",
        "cs" => "csharp",
        "php" => "php",
        "rb" => "ruby",
        "swift" => "swift",
        "kt" => "kotlin",
        "rs" => "rust",
        "sh" | "bash" | "zsh" => "shell",
        "sql" => "sql",
        "html" | "htm" => "html",
        "css" | "scss" | "sass" => "css",
        "json" => "json",
        "yaml" | "yml" => "yaml",
        "md" => "markdown",
        "dockerfile" => "dockerfile",
        "makefile" | "mk" => "makefile",
        _ => return None,
    };
    Some(language)
}

/// Returns the extension of `path` without the dot, in its original case.
///
/// Only the final path component is considered, so `dir.d/Makefile` has no
/// extension. A leading dot (`.gitignore`) counts as an extension separator,
/// as does the last of several dots (`archive.tar.gz` → `gz`).
pub fn file_extension(path: &str) -> &str {
    let name = file_name(path);
    match name.rfind('.') {
        Some(idx) => &name[idx + 1..],
        None => "",
    }
}

/// Returns the final component of `path`.
pub fn file_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

/// Classifies `path` into a language tag by its extension.
///
/// The lookup is case-insensitive. Paths without an extension, or with an
/// extension outside the table, classify as `"unknown"`.
///
/// # Examples
///
/// ```
/// use commit_ledger::classify::detect_language;
///
/// assert_eq!(detect_language("src/main.go"), "go");
/// assert_eq!(detect_language("A.TS"), "typescript");
/// assert_eq!(detect_language("README"), "unknown");
/// ```
pub fn detect_language(path: &str) -> &'static str {
    let ext = file_extension(path);
    if ext.is_empty() {
        return UNKNOWN_LANGUAGE;
    }
    language_for_extension(&ext.to_ascii_lowercase()).unwrap_or(UNKNOWN_LANGUAGE)
}
