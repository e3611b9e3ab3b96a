//! CSV output
//!
//! One row per record in execution order. Memory columns are in bytes,
//! durations in seconds with three fraction digits. Fields containing the
//! delimiter, quotes or line breaks are quoted per RFC 4180.

use gpumon_shared::utils::{format_seconds, time::format_rfc3339};
use gpumon_shared::{SessionReport, UnitRecord};

/// Column order of the CSV report
pub const CSV_COLUMNS: [&str; 14] = [
    "id",
    "status",
    "peak_allocated_bytes",
    "duration_seconds",
    "memory_increase_bytes",
    "initial_allocated_bytes",
    "final_allocated_bytes",
    "peak_reserved_bytes",
    "monitored",
    "incomplete",
    "initial_reserved_bytes",
    "final_reserved_bytes",
    "worker_id",
    "finished_at",
];

/// Render the CSV report, header row included
pub fn render_csv(report: &SessionReport) -> String {
    let mut out = String::new();
    out.push_str(&CSV_COLUMNS.join(","));
    out.push('\n');

    for record in &report.records {
        out.push_str(&csv_row(record).join(","));
        out.push('\n');
    }

    out
}

fn csv_row(record: &UnitRecord) -> Vec<String> {
    vec![
        escape_csv_field(&record.id),
        record.status.to_string(),
        record.peak_allocated.to_string(),
        format_seconds(record.duration_seconds),
        record.memory_increase.to_string(),
        record.initial_allocated.to_string(),
        record.final_allocated.to_string(),
        record.peak_reserved.to_string(),
        record.monitored.to_string(),
        record.incomplete.to_string(),
        record.initial_reserved.to_string(),
        record.final_reserved.to_string(),
        escape_csv_field(&record.worker_id),
        format_rfc3339(&record.finished_at),
    ]
}

/// Quote a field if it contains a delimiter, quote or line break
pub fn escape_csv_field(field: &str) -> String {
    if field.contains(|c: char| matches!(c, ',' | '"' | '\n' | '\r')) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
