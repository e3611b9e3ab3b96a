//! Markdown output
//!
//! Human-readable report: a summary block followed by every record in
//! execution order, so reports from two runs diff cleanly.

use gpumon_shared::utils::time::format_report_time;
use gpumon_shared::utils::{
    format_gib, format_mib, format_mib_f64, format_seconds, format_signed_mib,
};
use gpumon_shared::{SessionReport, UnitRecord};
use std::fmt::Write;

/// Render the Markdown report
pub fn render_markdown(report: &SessionReport) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail
    let _ = write_markdown(&mut out, report);
    out
}

fn write_markdown(out: &mut String, report: &SessionReport) -> std::fmt::Result {
    let summary = &report.summary;

    writeln!(out, "# GPU Memory Usage Report")?;
    writeln!(out)?;
    writeln!(out, "- **Session Started:** {}", format_report_time(&report.started_at))?;
    match &report.device {
        Some(device) => {
            writeln!(out, "- **GPU Device:** {}", escape_markdown_cell(&device.name))?;
            writeln!(out, "- **Total GPU Memory:** {} GiB", format_gib(device.total_memory))?;
        }
        None => writeln!(out, "- **GPU Device:** N/A")?,
    }
    if report.parallel_workers {
        writeln!(out, "- **Parallel Workers:** yes")?;
    }
    writeln!(out, "- **Total Tests:** {}", summary.count)?;
    writeln!(out, "- **Monitored Tests:** {}", summary.count_monitored)?;
    if summary.count_incomplete > 0 {
        writeln!(out, "- **Incomplete Tests:** {}", summary.count_incomplete)?;
    }
    writeln!(out)?;

    writeln!(out, "## Summary")?;
    writeln!(out)?;
    writeln!(
        out,
        "- Average Peak Memory: {} MiB",
        format_mib_f64(summary.average_peak_allocated)
    )?;
    writeln!(out, "- Max Peak Memory: {} MiB", format_mib(summary.max_peak_allocated))?;
    writeln!(out, "- Total Peak Memory: {} MiB", format_mib(summary.total_peak_allocated))?;
    writeln!(
        out,
        "- Total Duration: {} s",
        format_seconds(summary.total_duration_seconds)
    )?;
    writeln!(out)?;

    let top = report.top_records();
    if !top.is_empty() {
        writeln!(out, "## Top {} Memory Consumers", top.len())?;
        writeln!(out)?;
        for (rank, record) in top.iter().enumerate() {
            writeln!(
                out,
                "{}. {} - {} MiB peak, {} s",
                rank + 1,
                escape_markdown_cell(&record.id),
                format_mib(record.peak_allocated),
                format_seconds(record.duration_seconds)
            )?;
        }
        writeln!(out)?;
    }

    writeln!(out, "## Detailed Results")?;
    writeln!(out)?;

    if report.records.is_empty() {
        writeln!(out, "_No units were recorded._")?;
        return Ok(());
    }

    writeln!(
        out,
        "| # | Test Name | Status | Peak Allocated (MiB) | Duration (s) | Memory Increase (MiB) | Peak Reserved (MiB) | Notes |"
    )?;
    writeln!(out, "|---|---|---|---:|---:|---:|---:|---|")?;
    for (i, record) in report.records.iter().enumerate() {
        writeln!(
            out,
            "| {} | {} | {} | {} | {} | {} | {} | {} |",
            i + 1,
            escape_markdown_cell(&record.id),
            record.status,
            format_mib(record.peak_allocated),
            format_seconds(record.duration_seconds),
            format_signed_mib(record.memory_increase),
            format_mib(record.peak_reserved),
            notes(record)
        )?;
    }

    Ok(())
}

fn notes(record: &UnitRecord) -> &'static str {
    if record.incomplete {
        "incomplete"
    } else if !record.monitored {
        "not monitored"
    } else {
        ""
    }
}

/// Make text safe inside a table cell
fn escape_markdown_cell(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('|', "\\|")
        .replace(|c: char| c == '\n' || c == '\r', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::fixtures::{measured, two_unit_session};
    use crate::aggregate::{finalize, FinalizeOptions};
    use chrono::Utc;
    use gpumon_shared::{CollectedSession, UnitStatus, MASTER_WORKER};

    #[test]
    fn test_summary_block() {
        let report = finalize(two_unit_session(), &FinalizeOptions::default()).unwrap();
        let md = render_markdown(&report);

        assert!(md.starts_with("# GPU Memory Usage Report\n"));
        assert!(md.contains("- **GPU Device:** Simulated GPU"));
        assert!(md.contains("- **Total GPU Memory:** 24.00 GiB"));
        assert!(md.contains("- **Total Tests:** 2"));
        assert!(md.contains("- Average Peak Memory: 1075.00 MiB"));
        assert!(md.contains("- Max Peak Memory: 2000.00 MiB"));
        assert!(md.contains("- Total Duration: 1.700 s"));
        assert!(md.contains("1. tests/test_model.py::test_b - 2000.00 MiB peak, 1.200 s"));
    }

    #[test]
    fn test_rows_in_execution_order() {
        let report = finalize(two_unit_session(), &FinalizeOptions::default()).unwrap();
        let md = render_markdown(&report);

        let a = md.find("| 1 | tests/test_model.py::test_a |").unwrap();
        let b = md.find("| 2 | tests/test_model.py::test_b |").unwrap();
        assert!(a < b);
        assert!(md.contains("| 150.00 | 0.500 | 20.00 | 152.00 |"));
    }

    #[test]
    fn test_escapes_pipes() {
        let mut session = two_unit_session();
        session.records = vec![measured("test_or[a|b]", 0, 1, 0, 0.0)];
        let report = finalize(session, &FinalizeOptions::default()).unwrap();

        assert!(render_markdown(&report).contains("test_or[a\\|b]"));
    }

    #[test]
    fn test_unmonitored_session() {
        let mut session = CollectedSession::new(None, Utc::now());
        session.records = vec![UnitRecord::unmonitored(
            "t",
            UnitStatus::Passed,
            MASTER_WORKER,
            Utc::now(),
        )];
        let report = finalize(session, &FinalizeOptions::default()).unwrap();
        let md = render_markdown(&report);

        assert!(md.contains("- **GPU Device:** N/A"));
        assert!(md.contains("- **Monitored Tests:** 0"));
        assert!(!md.contains("## Top"));
        assert!(md.contains("| not monitored |"));
    }

    #[test]
    fn test_empty_session() {
        let report = finalize(
            CollectedSession::new(None, Utc::now()),
            &FinalizeOptions::default(),
        )
        .unwrap();
        assert!(render_markdown(&report).contains("_No units were recorded._"));
    }
}
