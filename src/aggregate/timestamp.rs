//! Push timestamp resolution.

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;

/// Layout tried after RFC 3339, interpreted as UTC.
const FALLBACK_LAYOUT: &str = "%Y-%m-%d %H:%M:%S";

/// Parses a vendor timestamp, or `None` if no known layout matches.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, FALLBACK_LAYOUT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Resolves the commit timestamp, falling back to the current time when the
/// raw value cannot be parsed.
pub fn resolve_timestamp(commit_id: &str, raw: &str) -> DateTime<Utc> {
    parse_timestamp(raw).unwrap_or_else(|| {
        warn!(commit_id, timestamp = raw, "Unparseable commit timestamp, using current time");
        Utc::now()
    })
}
