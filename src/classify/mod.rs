//! Pure classification helpers for file changes.
//!
//! - [`diff`]: added/removed line counts from unified-diff text
//! - [`language`]: language tags and path components from file paths

pub mod diff;
pub mod language;

pub use diff::parse_diff_stats;
pub use language::{UNKNOWN_LANGUAGE, detect_language, file_extension, file_name};
