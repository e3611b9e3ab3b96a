//! Render command implementation

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use gpumon_report::config::MonitorConfig;
use gpumon_report::export::json::load_report;
use gpumon_report::{finalize, render, ReportFormat};
use gpumon_shared::CollectedSession;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Json,
    Markdown,
    Csv,
    Html,
}

impl From<FormatArg> for ReportFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Json => ReportFormat::Json,
            FormatArg::Markdown => ReportFormat::Markdown,
            FormatArg::Csv => ReportFormat::Csv,
            FormatArg::Html => ReportFormat::Html,
        }
    }
}

#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Saved JSON report
    pub input: PathBuf,

    /// Print a single format to stdout instead of writing every format
    #[arg(short, long, value_enum)]
    pub format: Option<FormatArg>,
}

/// Load a saved report and render it again.
///
/// The summary and top consumers are recomputed with the current settings,
/// so `--top` applies to old reports too.
pub fn run(args: RenderArgs, config: &MonitorConfig) -> Result<()> {
    let saved = load_report(&args.input)?;
    let report = finalize(CollectedSession::from(saved), &config.finalize_options())
        .with_context(|| format!("Cannot re-render {}", args.input.display()))?;

    match args.format {
        Some(format) => {
            print!("{}", render(&report, format.into())?);
        }
        None => {
            super::write_and_summarize(&report, config)?;
        }
    }

    Ok(())
}
