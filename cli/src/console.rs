//! Console output of a monitored session

use colored::Colorize;
use gpumon_report::{ReportFormat, WrittenReport};
use gpumon_shared::utils::{format_gib, format_mib, format_mib_f64, format_seconds};
use gpumon_shared::{DeviceInfo, SessionReport, UnitRecord};

use crate::output;

const RULE_WIDTH: usize = 80;

/// Announce the device at session start
pub fn device_banner(device: Option<&DeviceInfo>) {
    match device {
        Some(d) => output::info(&format!(
            "GPU memory monitoring on {} ({} GiB)",
            d.name,
            format_gib(d.total_memory)
        )),
        None => output::warning("No accelerator available, units run unmonitored"),
    }
}

pub fn unit_line(record: &UnitRecord) -> String {
    let detail = if !record.monitored {
        "not monitored".to_string()
    } else {
        format!(
            "peak {} MiB, {} s",
            format_mib(record.peak_allocated),
            format_seconds(record.duration_seconds)
        )
    };
    format!("[GPU] {} {}: {}", record.id, record.status, detail)
}

/// Print one line per finished unit
pub fn print_unit(record: &UnitRecord) {
    println!("{}", unit_line(record).cyan());
}

/// End-of-session summary with the top consumers and written files
pub fn print_summary(report: &SessionReport, written: Option<&WrittenReport>) {
    let summary = &report.summary;
    let rule = "=".repeat(RULE_WIDTH);

    println!();
    println!("{}", rule);
    println!("{}", "GPU MEMORY SUMMARY".bold());
    println!("{}", rule);

    println!(
        "Tests monitored: {}/{}",
        summary.count_monitored, summary.count
    );
    if summary.count_incomplete > 0 {
        println!("Incomplete: {}", summary.count_incomplete.to_string().yellow());
    }
    if summary.count_monitored > 0 {
        println!(
            "Average peak: {} MiB",
            format_mib_f64(summary.average_peak_allocated)
        );
        println!("Max peak: {} MiB", format_mib(summary.max_peak_allocated));
    }
    println!(
        "Total duration: {} s",
        format_seconds(summary.total_duration_seconds)
    );

    let top = report.top_records();
    if !top.is_empty() {
        println!();
        println!("Top {} memory consumers:", top.len());
        for (rank, record) in top.iter().enumerate() {
            println!(
                "  {}. {} MiB  {}",
                rank + 1,
                format_mib(record.peak_allocated),
                record.id
            );
        }
    }

    if let Some(written) = written {
        println!();
        println!("Reports written to {}:", written.directory.display());
        for format in ReportFormat::ALL {
            if let Some(file) = written.files.iter().find(|f| f.format == format) {
                output::file(&format.to_string(), &file.path, file.bytes);
            }
        }
    }
    println!("{}", rule);
}
