//! Command implementations

pub mod demo;
pub mod merge;
pub mod render;
pub mod summary;

use anyhow::Result;
use gpumon_report::config::MonitorConfig;
use gpumon_report::{write_all, ReportWriteError, WrittenReport};
use gpumon_shared::SessionReport;

use crate::{console, output};

/// Write every report format and print the closing summary.
///
/// On a partial failure the formats that did make it to disk are still
/// listed before the error is returned.
pub(crate) fn write_and_summarize(
    report: &SessionReport,
    config: &MonitorConfig,
) -> Result<WrittenReport> {
    match write_all(report, &config.report_dir) {
        Ok(written) => {
            if config.print_summary {
                console::print_summary(report, Some(&written));
            } else {
                output::success(&format!(
                    "Reports written to {}",
                    written.directory.display()
                ));
            }
            Ok(written)
        }
        Err(e) => {
            if let ReportWriteError::Partial {
                directory,
                completed,
                ..
            } = &e
            {
                let partial = WrittenReport {
                    directory: directory.clone(),
                    files: completed.clone(),
                };
                if config.print_summary {
                    console::print_summary(report, Some(&partial));
                }
            }
            Err(e.into())
        }
    }
}
