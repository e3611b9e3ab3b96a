//! Minimal host runner
//!
//! Runs closures as units of work, bracketing each with `begin`/`end` on a
//! [`Collector`]. The body's failure (an `Err` or a panic) becomes the unit's
//! status; `end` is called on every path.

use gpumon_shared::{CollectedSession, UnitRecord, UnitStatus};
use std::fmt::Display;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::collector::{Collector, CollectorStateError};
use crate::StatsProvider;

type RecordObserver = Box<dyn FnMut(&UnitRecord)>;

/// Runs units of work under a collector
pub struct Harness<P, C> {
    collector: Collector<P, C>,
    observer: Option<RecordObserver>,
}

impl<P: StatsProvider, C: Clock> Harness<P, C> {
    pub fn new(collector: Collector<P, C>) -> Self {
        Self {
            collector,
            observer: None,
        }
    }

    /// Call `observer` with every record as soon as its unit ends
    pub fn on_record(mut self, observer: impl FnMut(&UnitRecord) + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn collector(&self) -> &Collector<P, C> {
        &self.collector
    }

    /// Run `body` as the unit `id`.
    ///
    /// `Ok` maps to PASSED, `Err` to FAILED and a panic to ERROR.
    pub fn run_unit<F, E>(&mut self, id: &str, body: F) -> Result<UnitStatus, CollectorStateError>
    where
        F: FnOnce() -> Result<(), E>,
        E: Display,
    {
        self.collector.begin(id)?;

        let status = match panic::catch_unwind(AssertUnwindSafe(body)) {
            Ok(Ok(())) => UnitStatus::Passed,
            Ok(Err(e)) => {
                debug!("Unit {} failed: {}", id, e);
                UnitStatus::Failed
            }
            Err(_) => {
                warn!("Unit {} panicked", id);
                UnitStatus::Error
            }
        };

        let record = self.collector.end(id, status)?;
        if let Some(observer) = self.observer.as_mut() {
            observer(record);
        }

        Ok(status)
    }

    /// Skip a unit before it starts. No record is produced.
    pub fn skip(&mut self, id: &str, reason: &str) {
        debug!("Skipping {}: {}", id, reason);
    }

    /// End the session and hand off its records
    pub fn finish(self) -> CollectedSession {
        self.collector.finish()
    }
}
