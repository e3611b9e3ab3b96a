//! Per-unit memory collector
//!
//! Brackets exactly one unit of work at a time with counter reads from a
//! [`StatsProvider`] and emits a [`UnitRecord`] per unit.

use chrono::{DateTime, Utc};
use gpumon_shared::{
    CollectedSession, DeviceInfo, MemoryReadings, PendingUnit, UnitRecord, UnitStatus,
    MASTER_WORKER,
};
use std::collections::HashSet;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::clock::{Clock, MonotonicClock};
use crate::StatsProvider;

/// Violation of the begin/end protocol
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollectorStateError {
    #[error("cannot begin '{requested}': unit '{open}' is still open")]
    AlreadyOpen { open: String, requested: String },

    #[error("cannot end '{id}': no unit is open")]
    NotOpen { id: String },

    #[error("cannot end '{requested}': the open unit is '{open}'")]
    Mismatch { open: String, requested: String },
}

/// Counters captured at `begin`
#[derive(Debug, Clone, Copy)]
struct Baseline {
    initial_allocated: u64,
    initial_reserved: u64,
}

#[derive(Debug)]
struct OpenUnit {
    /// Id the host passed to `begin`
    requested_id: String,
    /// Session-unique id the record will carry
    record_id: String,
    /// None when the provider was unavailable
    baseline: Option<Baseline>,
    started: Instant,
    started_at: DateTime<Utc>,
}

/// Collects one [`UnitRecord`] per unit of work
pub struct Collector<P, C = MonotonicClock> {
    provider: P,
    clock: C,
    worker_id: String,
    device: Option<DeviceInfo>,
    started_at: DateTime<Utc>,
    open: Option<OpenUnit>,
    used_ids: HashSet<String>,
    records: Vec<UnitRecord>,
}

impl<P: StatsProvider> Collector<P> {
    /// Create a collector timed by the system monotonic clock
    pub fn new(provider: P) -> Self {
        Self::with_clock(provider, MonotonicClock)
    }
}

impl<P: StatsProvider, C: Clock> Collector<P, C> {
    /// Create a collector with an explicit time source.
    ///
    /// The device description is captured once, here.
    pub fn with_clock(provider: P, clock: C) -> Self {
        let device = if provider.is_available() {
            provider.device_description()
        } else {
            None
        };

        match &device {
            Some(d) => info!("Monitoring device {} ({} bytes)", d.name, d.total_memory),
            None => info!("No stats provider available; units will be recorded unmonitored"),
        }

        Self {
            provider,
            clock,
            worker_id: MASTER_WORKER.to_string(),
            device,
            started_at: Utc::now(),
            open: None,
            used_ids: HashSet::new(),
            records: Vec::new(),
        }
    }

    /// Tag records with the id of the worker process running them
    pub fn with_worker_id(mut self, worker_id: impl Into<String>) -> Self {
        self.worker_id = worker_id.into();
        self
    }

    /// Device captured at session start
    pub fn device(&self) -> Option<&DeviceInfo> {
        self.device.as_ref()
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Whether a unit is currently open
    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// Records completed so far, in execution order
    pub fn records(&self) -> &[UnitRecord] {
        &self.records
    }

    /// Open a unit: reset peak counters and capture the initial readings.
    ///
    /// If the provider is unavailable the unit is opened unmonitored and the
    /// provider is not touched again until `end`.
    pub fn begin(&mut self, unit_id: &str) -> Result<(), CollectorStateError> {
        if let Some(open) = &self.open {
            return Err(CollectorStateError::AlreadyOpen {
                open: open.requested_id.clone(),
                requested: unit_id.to_string(),
            });
        }

        let record_id = self.reserve_id(unit_id);

        let baseline = if self.provider.is_available() {
            self.provider.release_cached();
            self.provider.reset_peak_counters();
            self.provider.synchronize();
            Some(Baseline {
                initial_allocated: self.provider.current_allocated(),
                initial_reserved: self.provider.current_reserved(),
            })
        } else {
            debug!("Stats provider unavailable for {}", record_id);
            None
        };

        debug!("begin {} (monitored={})", record_id, baseline.is_some());

        self.open = Some(OpenUnit {
            requested_id: unit_id.to_string(),
            record_id,
            baseline,
            started: self.clock.now(),
            started_at: Utc::now(),
        });

        Ok(())
    }

    /// Close the open unit and emit its record
    pub fn end(
        &mut self,
        unit_id: &str,
        status: UnitStatus,
    ) -> Result<&UnitRecord, CollectorStateError> {
        let open = match self.open.take() {
            Some(open) if open.requested_id == unit_id => open,
            Some(open) => {
                let err = CollectorStateError::Mismatch {
                    open: open.requested_id.clone(),
                    requested: unit_id.to_string(),
                };
                self.open = Some(open);
                return Err(err);
            }
            None => {
                return Err(CollectorStateError::NotOpen {
                    id: unit_id.to_string(),
                })
            }
        };

        let record = match open.baseline {
            None => UnitRecord::unmonitored(open.record_id, status, &self.worker_id, Utc::now()),
            Some(baseline) => {
                self.provider.synchronize();
                let duration = self.clock.now().saturating_duration_since(open.started);
                let readings = MemoryReadings {
                    initial_allocated: baseline.initial_allocated,
                    initial_reserved: baseline.initial_reserved,
                    final_allocated: self.provider.current_allocated(),
                    final_reserved: self.provider.current_reserved(),
                    peak_allocated: self.provider.peak_allocated(),
                    peak_reserved: self.provider.peak_reserved(),
                };
                UnitRecord::measured(
                    open.record_id,
                    status,
                    readings,
                    duration.as_secs_f64(),
                    &self.worker_id,
                    Utc::now(),
                )
            }
        };

        debug!(
            "end {} status={} peak={} duration={:.3}s",
            record.id, record.status, record.peak_allocated, record.duration_seconds
        );

        let index = self.records.len();
        self.records.push(record);
        Ok(&self.records[index])
    }

    /// Hand the session's records off for aggregation.
    ///
    /// A unit still open at this point is returned as `dangling` rather than
    /// dropped.
    pub fn finish(self) -> CollectedSession {
        let dangling = self.open.map(|open| {
            warn!("Unit {} was still open at session end", open.record_id);
            let elapsed = self.clock.now().saturating_duration_since(open.started);
            let baseline = open.baseline.unwrap_or(Baseline {
                initial_allocated: 0,
                initial_reserved: 0,
            });
            PendingUnit {
                id: open.record_id,
                monitored: open.baseline.is_some(),
                initial_allocated: baseline.initial_allocated,
                initial_reserved: baseline.initial_reserved,
                elapsed_seconds: elapsed.as_secs_f64(),
                worker_id: self.worker_id.clone(),
                started_at: open.started_at,
            }
        });

        CollectedSession {
            device: self.device,
            records: self.records,
            dangling,
            started_at: self.started_at,
            parallel_workers: false,
        }
    }

    /// Pick a session-unique id, suffixing repeated runs with `#<run>`
    fn reserve_id(&mut self, unit_id: &str) -> String {
        let mut candidate = unit_id.to_string();
        let mut run = 1;
        while self.used_ids.contains(&candidate) {
            run += 1;
            candidate = format!("{}#{}", unit_id, run);
        }
        self.used_ids.insert(candidate.clone());
        candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::simulated::SimulatedDevice;
    use crate::NullProvider;
    use std::time::Duration;

    const MB: u64 = 1024 * 1024;

    fn device() -> SimulatedDevice {
        SimulatedDevice::new("Simulated GPU", 8 * 1024 * MB)
    }

    #[test]
    fn test_measures_one_unit() {
        let device = device();
        let clock = ManualClock::new();
        let mut collector = Collector::with_clock(device.clone(), clock.clone());

        device.allocate(100 * MB).unwrap();
        collector.begin("test_a").unwrap();
        device.allocate(50 * MB).unwrap();
        device.free(30 * MB);
        clock.advance(Duration::from_millis(500));

        let record = collector.end("test_a", UnitStatus::Passed).unwrap();
        assert!(record.monitored);
        assert_eq!(record.initial_allocated, 100 * MB);
        assert_eq!(record.peak_allocated, 150 * MB);
        assert_eq!(record.final_allocated, 120 * MB);
        assert_eq!(record.memory_increase, (20 * MB) as i64);
        assert_eq!(record.duration_seconds, 0.5);
        assert_eq!(record.status, UnitStatus::Passed);
    }

    #[test]
    fn test_peak_reset_between_units() {
        let device = device();
        let mut collector = Collector::new(device.clone());

        collector.begin("big").unwrap();
        device.allocate(900 * MB).unwrap();
        device.free(900 * MB);
        collector.end("big", UnitStatus::Passed).unwrap();

        collector.begin("small").unwrap();
        device.allocate(10 * MB).unwrap();
        let record = collector.end("small", UnitStatus::Passed).unwrap();

        assert_eq!(record.peak_allocated, 10 * MB);
    }

    #[test]
    fn test_double_begin_fails() {
        let mut collector = Collector::new(device());
        collector.begin("a").unwrap();

        let err = collector.begin("b").unwrap_err();
        assert_eq!(
            err,
            CollectorStateError::AlreadyOpen {
                open: "a".to_string(),
                requested: "b".to_string(),
            }
        );

        // The original unit is still open and closes normally
        assert!(collector.end("a", UnitStatus::Passed).is_ok());
        assert_eq!(collector.records().len(), 1);
    }

    #[test]
    fn test_end_without_begin_fails() {
        let mut collector = Collector::new(device());
        let err = collector.end("ghost", UnitStatus::Passed).unwrap_err();
        assert_eq!(err, CollectorStateError::NotOpen { id: "ghost".to_string() });
        assert!(collector.records().is_empty());
    }

    #[test]
    fn test_end_mismatch_keeps_unit_open() {
        let mut collector = Collector::new(device());
        collector.begin("a").unwrap();

        let err = collector.end("b", UnitStatus::Passed).unwrap_err();
        assert!(matches!(err, CollectorStateError::Mismatch { .. }));
        assert!(collector.is_open());

        collector.end("a", UnitStatus::Failed).unwrap();
        assert!(!collector.is_open());
    }

    #[test]
    fn test_unavailable_provider_degrades() {
        let mut collector = Collector::new(NullProvider);
        assert!(collector.device().is_none());

        collector.begin("a").unwrap();
        let record = collector.end("a", UnitStatus::Passed).unwrap();
        assert!(!record.monitored);
        assert_eq!(record.peak_allocated, 0);
        assert_eq!(record.duration_seconds, 0.0);
    }

    #[test]
    fn test_repeated_runs_get_unique_ids() {
        let mut collector = Collector::new(device());
        for _ in 0..3 {
            collector.begin("flaky").unwrap();
            collector.end("flaky", UnitStatus::Passed).unwrap();
        }

        let ids: Vec<&str> = collector.records().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["flaky", "flaky#2", "flaky#3"]);
    }

    #[test]
    fn test_run_suffix_skips_taken_ids() {
        let mut collector = Collector::new(device());
        for id in ["t#2", "t", "t"] {
            collector.begin(id).unwrap();
            collector.end(id, UnitStatus::Passed).unwrap();
        }

        let ids: Vec<&str> = collector.records().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["t#2", "t", "t#3"]);
    }

    #[test]
    fn test_finish_reports_dangling_unit() {
        let device = device();
        let clock = ManualClock::new();
        let mut collector = Collector::with_clock(device.clone(), clock.clone());

        collector.begin("done").unwrap();
        collector.end("done", UnitStatus::Passed).unwrap();

        device.allocate(64 * MB).unwrap();
        collector.begin("aborted").unwrap();
        clock.advance(Duration::from_secs(2));

        let session = collector.finish();
        assert_eq!(session.records.len(), 1);
        let dangling = session.dangling.unwrap();
        assert_eq!(dangling.id, "aborted");
        assert!(dangling.monitored);
        assert_eq!(dangling.initial_allocated, 64 * MB);
        assert_eq!(dangling.elapsed_seconds, 2.0);
    }

    #[test]
    fn test_finish_carries_device_and_worker() {
        let collector = Collector::new(device()).with_worker_id("gw1");
        assert_eq!(collector.worker_id(), "gw1");

        let session = collector.finish();
        assert_eq!(session.device.unwrap().name, "Simulated GPU");
        assert!(session.dangling.is_none());
    }
}
