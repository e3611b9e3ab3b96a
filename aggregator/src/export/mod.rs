//! Report formats
//!
//! Every format is a pure function of a [`SessionReport`]:
//!
//! - **JSON**: lossless, machine-readable; loads back into a `SessionReport`
//! - **Markdown**: summary block and a per-unit table in execution order
//! - **CSV**: one row per unit, byte units, fixed column order
//! - **HTML**: self-contained interactive view (sort, search, tier filters)
//!
//! Memory values shown in MiB and durations in seconds all go through the
//! formatters in `gpumon_shared::utils`, so the formats agree digit for digit.

pub mod csv;
pub mod html;
pub mod json;
pub mod markdown;

use gpumon_shared::SessionReport;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::REPORT_BASENAME;

/// Output format of a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Json,
    Markdown,
    Csv,
    Html,
}

impl ReportFormat {
    pub const ALL: [ReportFormat; 4] = [
        ReportFormat::Json,
        ReportFormat::Markdown,
        ReportFormat::Csv,
        ReportFormat::Html,
    ];

    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Json => "json",
            ReportFormat::Markdown => "md",
            ReportFormat::Csv => "csv",
            ReportFormat::Html => "html",
        }
    }

    /// File name of this format inside the report directory
    pub fn file_name(&self) -> String {
        format!("{}.{}", REPORT_BASENAME, self.extension())
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReportFormat::Json => "JSON",
            ReportFormat::Markdown => "Markdown",
            ReportFormat::Csv => "CSV",
            ReportFormat::Html => "HTML",
        };
        f.write_str(name)
    }
}

/// A report could not be encoded
#[derive(Debug, Error)]
#[error("failed to render {format} report: {source}")]
pub struct RenderError {
    pub format: ReportFormat,
    #[source]
    pub source: serde_json::Error,
}

/// Render `report` in `format`
pub fn render(report: &SessionReport, format: ReportFormat) -> Result<String, RenderError> {
    let rendered = match format {
        ReportFormat::Json => json::render_json(report),
        ReportFormat::Markdown => Ok(markdown::render_markdown(report)),
        ReportFormat::Csv => Ok(csv::render_csv(report)),
        ReportFormat::Html => html::render_html(report),
    };
    rendered.map_err(|source| RenderError { format, source })
}
