//! Time-related utilities

use chrono::{DateTime, SecondsFormat, Utc};

/// Current wall-clock time
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Format a timestamp for report headers (e.g. "2026-10-19 14:03:12 UTC")
pub fn format_report_time(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Format a timestamp as RFC 3339 with millisecond precision
pub fn format_rfc3339(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}
