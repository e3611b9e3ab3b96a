//! Session aggregation and report rendering
//!
//! Turns the records a collector produced into a [`SessionReport`] and writes
//! it out as JSON, Markdown, CSV and a self-contained HTML view.
//!
//! [`SessionReport`]: gpumon_shared::SessionReport

/// Number of top consumers ranked when nothing else is configured
pub const DEFAULT_TOP_N: usize = 5;

/// Base file name shared by every report format
pub const REPORT_BASENAME: &str = "gpu_memory_report";

pub mod aggregate;
pub mod config;
pub mod export;
pub mod spool;
pub mod view;
pub mod writer;

pub use aggregate::{finalize, EmptyReportError, FinalizeOptions};
pub use export::{render, ReportFormat};
pub use writer::{write_all, ReportWriteError, WrittenReport};
