//! Session-level report structures
//!
//! `CollectedSession` is what the collector hands off at session end;
//! `SessionReport` is what the aggregator derives from it and what every
//! output format is rendered from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::record::{PendingUnit, UnitRecord};

/// Version of the structured report layout
pub const SCHEMA_VERSION: u32 = 1;

/// Accelerator description captured once at session start
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub name: String,

    /// Total device memory in bytes
    pub total_memory: u64,
}

/// Everything the collector produced during one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectedSession {
    pub device: Option<DeviceInfo>,

    /// Completed records in execution order
    pub records: Vec<UnitRecord>,

    /// Unit still open when the session closed, if any
    pub dangling: Option<PendingUnit>,

    pub started_at: DateTime<Utc>,

    /// Records were gathered from several worker processes
    pub parallel_workers: bool,
}

impl CollectedSession {
    /// Create a session with no records
    pub fn new(device: Option<DeviceInfo>, started_at: DateTime<Utc>) -> Self {
        Self {
            device,
            records: Vec::new(),
            dangling: None,
            started_at,
            parallel_workers: false,
        }
    }
}

impl From<SessionReport> for CollectedSession {
    fn from(report: SessionReport) -> Self {
        Self {
            device: report.device,
            records: report.records,
            dangling: None,
            started_at: report.started_at,
            parallel_workers: report.parallel_workers,
        }
    }
}

/// Derived statistics over a session's records
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Number of records
    pub count: usize,

    /// Records measured to completion with an available provider
    pub count_monitored: usize,

    /// Records closed at session end without a matching `end`
    pub count_incomplete: usize,

    /// Sum of peak_allocated over monitored records, in bytes
    pub total_peak_allocated: u64,

    /// Mean peak_allocated over monitored records (0 when none), in bytes
    pub average_peak_allocated: f64,

    /// Largest peak_allocated over monitored records, in bytes
    pub max_peak_allocated: u64,

    /// Sum of duration_seconds over all records
    pub total_duration_seconds: f64,
}

/// Aggregated report for one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub schema_version: u32,

    pub started_at: DateTime<Utc>,

    pub device: Option<DeviceInfo>,

    pub parallel_workers: bool,

    pub summary: SessionSummary,

    /// Ids of the highest-peak records, descending by peak_allocated
    pub top_consumers: Vec<String>,

    /// All records in execution order
    pub records: Vec<UnitRecord>,
}

impl SessionReport {
    /// Look up a record by id
    pub fn record(&self, id: &str) -> Option<&UnitRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Resolve `top_consumers` into the records they refer to
    pub fn top_records(&self) -> Vec<&UnitRecord> {
        self.top_consumers
            .iter()
            .filter_map(|id| self.record(id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::record::{UnitStatus, MASTER_WORKER};

    fn record(id: &str) -> UnitRecord {
        UnitRecord::unmonitored(id, UnitStatus::Passed, MASTER_WORKER, Utc::now())
    }

    #[test]
    fn test_top_records_resolves_ids() {
        let report = SessionReport {
            schema_version: SCHEMA_VERSION,
            started_at: Utc::now(),
            device: None,
            parallel_workers: false,
            summary: SessionSummary::default(),
            top_consumers: vec!["b".to_string(), "a".to_string()],
            records: vec![record("a"), record("b")],
        };

        let top: Vec<&str> = report.top_records().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(top, vec!["b", "a"]);
        assert!(report.record("c").is_none());
    }

    #[test]
    fn test_report_into_session() {
        let started_at = Utc::now();
        let report = SessionReport {
            schema_version: SCHEMA_VERSION,
            started_at,
            device: Some(DeviceInfo {
                name: "Test GPU".to_string(),
                total_memory: 1 << 30,
            }),
            parallel_workers: true,
            summary: SessionSummary::default(),
            top_consumers: vec![],
            records: vec![record("a")],
        };

        let session = CollectedSession::from(report);
        assert_eq!(session.records.len(), 1);
        assert!(session.dangling.is_none());
        assert!(session.parallel_workers);
        assert_eq!(session.started_at, started_at);
    }
}
