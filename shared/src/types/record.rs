//! Per-unit measurement records
//!
//! A `UnitRecord` is produced by the collector once a unit of work has been
//! bracketed by `begin`/`end`. It is immutable after that point.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Worker identifier used when the session runs in a single process
pub const MASTER_WORKER: &str = "master";

/// Outcome of a unit of work, independent of whether it was monitored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitStatus {
    Passed,
    Failed,
    Skipped,
    Error,
}

impl UnitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitStatus::Passed => "PASSED",
            UnitStatus::Failed => "FAILED",
            UnitStatus::Skipped => "SKIPPED",
            UnitStatus::Error => "ERROR",
        }
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UnitStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "passed" => Ok(UnitStatus::Passed),
            "failed" => Ok(UnitStatus::Failed),
            "skipped" => Ok(UnitStatus::Skipped),
            "error" => Ok(UnitStatus::Error),
            _ => anyhow::bail!("Invalid unit status: {}", s),
        }
    }
}

/// Raw counter readings taken around one unit, in bytes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryReadings {
    pub initial_allocated: u64,
    pub initial_reserved: u64,
    pub final_allocated: u64,
    pub final_reserved: u64,
    pub peak_allocated: u64,
    pub peak_reserved: u64,
}

/// Record violates one of the measurement invariants
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordInvariantError {
    #[error("record '{id}': peak_allocated is below the initial or final reading")]
    PeakBelowReading { id: String },

    #[error("record '{id}': memory_increase does not equal final_allocated - initial_allocated")]
    IncreaseMismatch { id: String },

    #[error("record '{id}': duration_seconds must be a finite, non-negative number")]
    InvalidDuration { id: String },

    #[error("record '{id}': unmonitored record carries non-zero counters")]
    UnmonitoredWithCounters { id: String },
}

/// Resource usage of one unit of work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitRecord {
    /// Session-unique identifier (e.g. fully-qualified test name)
    pub id: String,

    pub status: UnitStatus,

    /// False when no stats provider was available for this unit
    pub monitored: bool,

    /// True when the unit was still open at session end and closed by the aggregator
    #[serde(default)]
    pub incomplete: bool,

    pub initial_allocated: u64,
    pub final_allocated: u64,
    pub peak_allocated: u64,

    /// final_allocated - initial_allocated
    pub memory_increase: i64,

    #[serde(default)]
    pub initial_reserved: u64,
    #[serde(default)]
    pub final_reserved: u64,
    pub peak_reserved: u64,

    /// Wall-clock seconds between begin and end
    pub duration_seconds: f64,

    /// Process that ran the unit
    #[serde(default = "default_worker")]
    pub worker_id: String,

    pub finished_at: DateTime<Utc>,
}

fn default_worker() -> String {
    MASTER_WORKER.to_string()
}

impl UnitRecord {
    /// Build a record for a unit measured while the provider was available.
    ///
    /// Peak counters are clamped so they never fall below the bracketing
    /// readings, and a negative or non-finite duration is stored as zero.
    pub fn measured(
        id: impl Into<String>,
        status: UnitStatus,
        readings: MemoryReadings,
        duration_seconds: f64,
        worker_id: impl Into<String>,
        finished_at: DateTime<Utc>,
    ) -> Self {
        let peak_allocated = readings
            .peak_allocated
            .max(readings.initial_allocated)
            .max(readings.final_allocated);
        let peak_reserved = readings
            .peak_reserved
            .max(readings.initial_reserved)
            .max(readings.final_reserved);

        Self {
            id: id.into(),
            status,
            monitored: true,
            incomplete: false,
            initial_allocated: readings.initial_allocated,
            final_allocated: readings.final_allocated,
            peak_allocated,
            memory_increase: signed_delta(readings.final_allocated, readings.initial_allocated),
            initial_reserved: readings.initial_reserved,
            final_reserved: readings.final_reserved,
            peak_reserved,
            duration_seconds: sanitize_duration(duration_seconds),
            worker_id: worker_id.into(),
            finished_at,
        }
    }

    /// Build a record for a unit that ran without an available provider
    pub fn unmonitored(
        id: impl Into<String>,
        status: UnitStatus,
        worker_id: impl Into<String>,
        finished_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            status,
            monitored: false,
            incomplete: false,
            initial_allocated: 0,
            final_allocated: 0,
            peak_allocated: 0,
            memory_increase: 0,
            initial_reserved: 0,
            final_reserved: 0,
            peak_reserved: 0,
            duration_seconds: 0.0,
            worker_id: worker_id.into(),
            finished_at,
        }
    }

    /// Whether the record takes part in peak-memory ranking and statistics
    pub fn is_rankable(&self) -> bool {
        self.monitored && !self.incomplete
    }

    /// Check the measurement invariants
    pub fn validate(&self) -> Result<(), RecordInvariantError> {
        if !self.duration_seconds.is_finite() || self.duration_seconds < 0.0 {
            return Err(RecordInvariantError::InvalidDuration {
                id: self.id.clone(),
            });
        }

        if self.memory_increase != signed_delta(self.final_allocated, self.initial_allocated) {
            return Err(RecordInvariantError::IncreaseMismatch {
                id: self.id.clone(),
            });
        }

        if self.monitored {
            if self.peak_allocated < self.final_allocated
                || self.peak_allocated < self.initial_allocated
            {
                return Err(RecordInvariantError::PeakBelowReading {
                    id: self.id.clone(),
                });
            }
        } else if self.initial_allocated != 0
            || self.final_allocated != 0
            || self.peak_allocated != 0
            || self.peak_reserved != 0
        {
            return Err(RecordInvariantError::UnmonitoredWithCounters {
                id: self.id.clone(),
            });
        }

        Ok(())
    }
}

/// A unit that was begun but never ended when the session closed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingUnit {
    pub id: String,
    pub monitored: bool,
    pub initial_allocated: u64,
    pub initial_reserved: u64,
    /// Seconds the unit had been open when the session closed
    pub elapsed_seconds: f64,
    pub worker_id: String,
    pub started_at: DateTime<Utc>,
}

fn signed_delta(after: u64, before: u64) -> i64 {
    (after as i128 - before as i128).clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

fn sanitize_duration(seconds: f64) -> f64 {
    if seconds.is_finite() && seconds > 0.0 {
        seconds
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MB: u64 = 1024 * 1024;

    fn readings(initial: u64, peak: u64, final_: u64) -> MemoryReadings {
        MemoryReadings {
            initial_allocated: initial * MB,
            initial_reserved: initial * MB,
            final_allocated: final_ * MB,
            final_reserved: final_ * MB,
            peak_allocated: peak * MB,
            peak_reserved: peak * MB,
        }
    }

    #[test]
    fn test_measured_computes_increase() {
        let record = UnitRecord::measured(
            "tests/test_a.py::test_a",
            UnitStatus::Passed,
            readings(100, 150, 120),
            0.5,
            MASTER_WORKER,
            Utc::now(),
        );

        assert!(record.monitored);
        assert_eq!(record.memory_increase, (20 * MB) as i64);
        assert_eq!(record.peak_allocated, 150 * MB);
        assert!(record.validate().is_ok());
    }

    #[test]
    fn test_measured_negative_increase() {
        let record = UnitRecord::measured(
            "frees",
            UnitStatus::Passed,
            readings(300, 300, 100),
            0.1,
            MASTER_WORKER,
            Utc::now(),
        );
        assert_eq!(record.memory_increase, -((200 * MB) as i64));
        assert!(record.validate().is_ok());
    }

    #[test]
    fn test_measured_clamps_peak() {
        // Provider reported a peak below the final reading
        let record = UnitRecord::measured(
            "odd",
            UnitStatus::Passed,
            readings(10, 5, 40),
            0.0,
            MASTER_WORKER,
            Utc::now(),
        );
        assert_eq!(record.peak_allocated, 40 * MB);
        assert!(record.peak_allocated >= record.initial_allocated);
    }

    #[test]
    fn test_measured_sanitizes_duration() {
        let record = UnitRecord::measured(
            "nan",
            UnitStatus::Passed,
            MemoryReadings::default(),
            f64::NAN,
            MASTER_WORKER,
            Utc::now(),
        );
        assert_eq!(record.duration_seconds, 0.0);

        let record = UnitRecord::measured(
            "neg",
            UnitStatus::Passed,
            MemoryReadings::default(),
            -1.0,
            MASTER_WORKER,
            Utc::now(),
        );
        assert_eq!(record.duration_seconds, 0.0);
    }

    #[test]
    fn test_unmonitored_is_zeroed() {
        let record = UnitRecord::unmonitored("u", UnitStatus::Skipped, MASTER_WORKER, Utc::now());
        assert!(!record.monitored);
        assert!(!record.is_rankable());
        assert_eq!(record.peak_allocated, 0);
        assert_eq!(record.memory_increase, 0);
        assert!(record.validate().is_ok());
    }

    #[test]
    fn test_validate_detects_tampering() {
        let mut record = UnitRecord::measured(
            "t",
            UnitStatus::Passed,
            readings(100, 150, 120),
            0.5,
            MASTER_WORKER,
            Utc::now(),
        );
        record.memory_increase += 1;
        assert_eq!(
            record.validate(),
            Err(RecordInvariantError::IncreaseMismatch { id: "t".to_string() })
        );

        record.memory_increase -= 1;
        record.peak_allocated = 0;
        assert!(matches!(
            record.validate(),
            Err(RecordInvariantError::PeakBelowReading { .. })
        ));
    }

    #[test]
    fn test_status_round_trip() {
        assert_eq!("passed".parse::<UnitStatus>().unwrap(), UnitStatus::Passed);
        assert_eq!("ERROR".parse::<UnitStatus>().unwrap(), UnitStatus::Error);
        assert!("flaky".parse::<UnitStatus>().is_err());
        assert_eq!(UnitStatus::Skipped.to_string(), "SKIPPED");

        let json = serde_json::to_string(&UnitStatus::Failed).unwrap();
        assert_eq!(json, "\"FAILED\"");
    }

    #[test]
    fn test_record_json_defaults() {
        // Older spool files carry neither reserved readings nor worker id
        let json = r#"{
            "id": "t",
            "status": "PASSED",
            "monitored": true,
            "initial_allocated": 1,
            "final_allocated": 2,
            "peak_allocated": 3,
            "memory_increase": 1,
            "peak_reserved": 4,
            "duration_seconds": 0.25,
            "finished_at": "2026-01-01T00:00:00Z"
        }"#;
        let record: UnitRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.worker_id, MASTER_WORKER);
        assert!(!record.incomplete);
        assert_eq!(record.initial_reserved, 0);
    }
}
