//! Merge command implementation

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use gpumon_report::config::MonitorConfig;
use gpumon_report::finalize;
use gpumon_report::spool::{drain_spool, spool_dir};
use gpumon_shared::utils::parse_size;
use gpumon_shared::{CollectedSession, DeviceInfo};

use crate::output;

#[derive(Args, Debug, Default)]
pub struct MergeArgs {
    /// Device name recorded in the merged report
    #[arg(long, requires = "device_memory")]
    pub device_name: Option<String>,

    /// Device memory recorded in the merged report (e.g., "24GB")
    #[arg(long, requires = "device_name")]
    pub device_memory: Option<String>,
}

/// Drain the worker spool under the report directory and write one report
pub fn run(args: MergeArgs, config: &MonitorConfig) -> Result<()> {
    let device = match (args.device_name, args.device_memory) {
        (Some(name), Some(memory)) => Some(DeviceInfo {
            name,
            total_memory: parse_size(&memory).context("Invalid --device-memory")?,
        }),
        _ => None,
    };

    let drain = drain_spool(&config.report_dir)?;
    for path in &drain.skipped {
        output::warning(&format!("Skipped unreadable spool file {}", path.display()));
    }
    if drain.records.is_empty() {
        output::info(&format!(
            "No spooled records in {}",
            spool_dir(&config.report_dir).display()
        ));
    }

    let started_at = drain
        .records
        .iter()
        .map(|r| {
            r.finished_at - chrono::Duration::milliseconds((r.duration_seconds * 1000.0) as i64)
        })
        .min()
        .unwrap_or_else(Utc::now);

    let mut session = CollectedSession::new(device, started_at);
    session.records = drain.records;
    session.parallel_workers = true;

    let report = finalize(session, &config.finalize_options())?;
    super::write_and_summarize(&report, config)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::demo::{self, DemoArgs};
    use gpumon_report::export::json::load_report;
    use gpumon_report::ReportFormat;
    use gpumon_shared::utils::GIB;

    #[test]
    fn test_merge_two_workers() {
        let tmp = tempfile::tempdir().unwrap();
        let config = MonitorConfig {
            report_dir: tmp.path().to_path_buf(),
            print_summary: false,
            ..MonitorConfig::default()
        };
        for worker in ["gw0", "gw1"] {
            let args = DemoArgs {
                worker: Some(worker.to_string()),
                ..DemoArgs::default()
            };
            demo::run(args, &config).unwrap();
        }

        let args = MergeArgs {
            device_name: Some("Simulated GPU".to_string()),
            device_memory: Some("24GB".to_string()),
        };
        run(args, &config).unwrap();

        let report = load_report(&tmp.path().join(ReportFormat::Json.file_name())).unwrap();
        assert!(report.parallel_workers);
        assert_eq!(report.device.as_ref().unwrap().total_memory, 24 * GIB);
        assert_eq!(report.summary.count, 14);
        assert!(report.records.iter().any(|r| r.worker_id == "gw0"));
        assert!(report.records.iter().any(|r| r.worker_id == "gw1"));
        assert!(report.records.iter().all(|r| r.finished_at >= report.started_at));
        assert!(!tmp.path().join(".temp").exists());
    }

    #[test]
    fn test_merge_empty_spool() {
        let tmp = tempfile::tempdir().unwrap();
        let config = MonitorConfig {
            report_dir: tmp.path().to_path_buf(),
            print_summary: false,
            ..MonitorConfig::default()
        };

        run(MergeArgs::default(), &config).unwrap();

        let report = load_report(&tmp.path().join(ReportFormat::Json.file_name())).unwrap();
        assert_eq!(report.summary.count, 0);
        assert!(report.device.is_none());
    }
}
