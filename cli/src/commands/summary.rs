//! Summary command implementation

use anyhow::Result;
use clap::Args;
use gpumon_report::config::MonitorConfig;
use gpumon_report::export::json::load_report;
use gpumon_report::ReportFormat;
use std::path::PathBuf;

use crate::console;

#[derive(Args, Debug)]
pub struct SummaryArgs {
    /// Saved JSON report (defaults to the one in the report directory)
    pub input: Option<PathBuf>,
}

pub fn run(args: SummaryArgs, config: &MonitorConfig) -> Result<()> {
    let path = args
        .input
        .unwrap_or_else(|| config.report_dir.join(ReportFormat::Json.file_name()));
    let report = load_report(&path)?;

    console::device_banner(report.device.as_ref());
    for record in &report.records {
        console::print_unit(record);
    }
    console::print_summary(&report, None);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_report() {
        let tmp = tempfile::tempdir().unwrap();
        let config = MonitorConfig {
            report_dir: tmp.path().to_path_buf(),
            ..MonitorConfig::default()
        };
        let err = run(SummaryArgs { input: None }, &config).unwrap_err();
        assert!(err.to_string().contains("Failed to read report file"));
    }
}
