//! Writing the report files
//!
//! Each format is written to a temporary file in the report directory and
//! renamed over `gpu_memory_report.<ext>`, so a reader never sees a truncated
//! report. Formats are independent: one failing does not stop the others.

use anyhow::Context;
use gpumon_shared::SessionReport;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::export::{render, ReportFormat};

/// One report file on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFile {
    pub format: ReportFormat,
    pub path: PathBuf,
    pub bytes: usize,
}

/// Every report file of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenReport {
    pub directory: PathBuf,
    pub files: Vec<WrittenFile>,
}

impl WrittenReport {
    pub fn path(&self, format: ReportFormat) -> Option<&Path> {
        self.files
            .iter()
            .find(|f| f.format == format)
            .map(|f| f.path.as_path())
    }
}

/// A single format that could not be written
#[derive(Debug)]
pub struct FormatFailure {
    pub format: ReportFormat,
    pub error: anyhow::Error,
}

#[derive(Debug, Error)]
pub enum ReportWriteError {
    /// The report directory could not be created; nothing was written
    #[error("cannot create report directory {}: {source}", .path.display())]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Some formats were written, others failed
    #[error(
        "{} of {} report formats failed in {}: {}",
        .failures.len(),
        ReportFormat::ALL.len(),
        .directory.display(),
        describe(.failures)
    )]
    Partial {
        directory: PathBuf,
        completed: Vec<WrittenFile>,
        failures: Vec<FormatFailure>,
    },
}

impl ReportWriteError {
    /// Files that made it to disk before the error
    pub fn completed(&self) -> &[WrittenFile] {
        match self {
            ReportWriteError::Directory { .. } => &[],
            ReportWriteError::Partial { completed, .. } => completed,
        }
    }
}

fn describe(failures: &[FormatFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{}: {:#}", f.format, f.error))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Write every format of `report` into `dir`, creating it if needed.
///
/// Existing report files are replaced.
pub fn write_all(report: &SessionReport, dir: &Path) -> Result<WrittenReport, ReportWriteError> {
    std::fs::create_dir_all(dir).map_err(|source| ReportWriteError::Directory {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files = Vec::with_capacity(ReportFormat::ALL.len());
    let mut failures = Vec::new();

    for format in ReportFormat::ALL {
        match write_format(report, dir, format) {
            Ok(file) => {
                debug!("Wrote {} report ({} bytes): {}", format, file.bytes, file.path.display());
                files.push(file);
            }
            Err(error) => {
                warn!("Failed to write {} report: {:#}", format, error);
                failures.push(FormatFailure { format, error });
            }
        }
    }

    if !failures.is_empty() {
        return Err(ReportWriteError::Partial {
            directory: dir.to_path_buf(),
            completed: files,
            failures,
        });
    }

    info!("GPU memory reports written to {}", dir.display());
    Ok(WrittenReport {
        directory: dir.to_path_buf(),
        files,
    })
}

fn write_format(
    report: &SessionReport,
    dir: &Path,
    format: ReportFormat,
) -> anyhow::Result<WrittenFile> {
    let contents = render(report, format)?;
    let path = dir.join(format.file_name());
    write_atomic(dir, &path, contents.as_bytes())?;

    Ok(WrittenFile {
        format,
        path,
        bytes: contents.len(),
    })
}

/// Write `contents` to a temporary file in `dir` and rename it onto `path`
pub(crate) fn write_atomic(dir: &Path, path: &Path, contents: &[u8]) -> anyhow::Result<()> {
    let mut tmp = tempfile::Builder::new()
        .prefix(".gpumon-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;

    tmp.write_all(contents)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to replace {}", path.display()))?;

    Ok(())
}
