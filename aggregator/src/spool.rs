//! Worker spool
//!
//! When units run in several worker processes, each worker spills its
//! finished records as individual JSON files under `<report_dir>/.temp/`.
//! The coordinating process drains that directory into one record list
//! before finalizing the session.

use anyhow::{Context, Result};
use gpumon_shared::UnitRecord;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::writer::write_atomic;

/// Spool directory name inside the report directory
pub const SPOOL_DIR: &str = ".temp";

const FILE_PREFIX: &str = "gpu_data_";
const MAX_ID_LEN: usize = 96;

pub fn spool_dir(report_dir: &Path) -> PathBuf {
    report_dir.join(SPOOL_DIR)
}

/// Records recovered from a spool
#[derive(Debug, Default)]
pub struct SpoolDrain {
    /// Ordered by `finished_at`, then id
    pub records: Vec<UnitRecord>,
    /// Files that could not be read or parsed; they are left in place
    pub skipped: Vec<PathBuf>,
}

/// Spill one record; returns the file written
pub fn spool_record(report_dir: &Path, record: &UnitRecord) -> Result<PathBuf> {
    let dir = spool_dir(report_dir);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create spool directory: {}", dir.display()))?;

    let path = dir.join(spool_file_name(&record.worker_id, &record.id));
    let json = serde_json::to_vec(record).context("Failed to encode record")?;
    write_atomic(&dir, &path, &json)?;

    debug!("Spooled {} to {}", record.id, path.display());
    Ok(path)
}

/// Read and remove every spooled record under `report_dir`.
///
/// A missing spool directory yields an empty drain. Unreadable files are
/// logged and skipped. Ids repeated across workers get a `#n` suffix the way
/// the collector numbers reruns.
pub fn drain_spool(report_dir: &Path) -> Result<SpoolDrain> {
    let dir = spool_dir(report_dir);
    if !dir.is_dir() {
        debug!("No spool directory at {}", dir.display());
        return Ok(SpoolDrain::default());
    }

    let mut paths: Vec<PathBuf> = std::fs::read_dir(&dir)
        .with_context(|| format!("Failed to read spool directory: {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| is_spool_file(path))
        .collect();
    paths.sort();

    let mut drain = SpoolDrain::default();
    for path in paths {
        match read_spooled(&path) {
            Ok(record) => {
                if let Err(e) = std::fs::remove_file(&path) {
                    warn!("Failed to remove spool file {}: {}", path.display(), e);
                }
                drain.records.push(record);
            }
            Err(e) => {
                warn!("Skipping spool file {}: {:#}", path.display(), e);
                drain.skipped.push(path);
            }
        }
    }

    // Only succeeds once the directory is empty
    if std::fs::remove_dir(&dir).is_ok() {
        debug!("Removed spool directory {}", dir.display());
    }

    drain
        .records
        .sort_by(|a, b| a.finished_at.cmp(&b.finished_at).then_with(|| a.id.cmp(&b.id)));
    dedupe_ids(&mut drain.records);

    info!(
        "Drained {} spooled records ({} skipped)",
        drain.records.len(),
        drain.skipped.len()
    );
    Ok(drain)
}

fn read_spooled(path: &Path) -> Result<UnitRecord> {
    let contents = std::fs::read_to_string(path).context("Failed to read file")?;
    let record: UnitRecord = serde_json::from_str(&contents).context("Failed to parse record")?;
    record.validate()?;
    Ok(record)
}

fn is_spool_file(path: &Path) -> bool {
    let name = match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => name,
        None => return false,
    };
    path.is_file() && name.starts_with(FILE_PREFIX) && name.ends_with(".json")
}

fn dedupe_ids(records: &mut [UnitRecord]) {
    let mut taken: HashSet<String> = HashSet::new();
    let originals: HashSet<String> = records.iter().map(|r| r.id.clone()).collect();

    for record in records.iter_mut() {
        if taken.insert(record.id.clone()) {
            continue;
        }
        let mut run = 1;
        let renamed = loop {
            run += 1;
            let candidate = format!("{}#{}", record.id, run);
            if !taken.contains(&candidate) && !originals.contains(&candidate) {
                break candidate;
            }
        };
        debug!("Renaming duplicate spooled id {} to {}", record.id, renamed);
        taken.insert(renamed.clone());
        record.id = renamed;
    }
}

/// `gpu_data_<worker>_<id>_<hash>.json` with every character outside
/// `[A-Za-z0-9._-]` replaced. The hash keeps distinct ids apart after
/// sanitizing and truncation.
fn spool_file_name(worker_id: &str, unit_id: &str) -> String {
    let mut hasher = DefaultHasher::new();
    unit_id.hash(&mut hasher);

    let mut id = sanitize(unit_id);
    id.truncate(MAX_ID_LEN);

    format!(
        "{}{}_{}_{:016x}.json",
        FILE_PREFIX,
        sanitize(worker_id),
        id,
        hasher.finish()
    )
}

fn sanitize(text: &str) -> String {
    text.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
