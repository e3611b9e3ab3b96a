//! Aggregation of unit records into a session report
//!
//! `finalize` is a pure function of the collected session and the options:
//! running it twice on the same input yields the same report.

use gpumon_shared::{
    CollectedSession, MemoryReadings, PendingUnit, SessionReport, SessionSummary, UnitRecord,
    UnitStatus, SCHEMA_VERSION,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::DEFAULT_TOP_N;

/// A non-empty session was required but nothing was monitored
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no monitored units in session ({total} records)")]
pub struct EmptyReportError {
    pub total: usize,
}

/// Options for [`finalize`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizeOptions {
    /// How many records `top_consumers` ranks
    pub top_n: usize,

    /// Fail with [`EmptyReportError`] when no unit was monitored
    pub require_monitored: bool,
}

impl Default for FinalizeOptions {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_TOP_N,
            require_monitored: false,
        }
    }
}

/// Build the session report from everything the collector handed off.
///
/// A unit left open at session end is closed here as ERROR and flagged
/// incomplete; it stays in `records` but is not ranked.
pub fn finalize(
    session: CollectedSession,
    options: &FinalizeOptions,
) -> Result<SessionReport, EmptyReportError> {
    let CollectedSession {
        device,
        mut records,
        dangling,
        started_at,
        parallel_workers,
    } = session;

    if let Some(pending) = dangling {
        warn!("Closing unit {} left open at session end", pending.id);
        records.push(close_dangling(pending));
    }

    let summary = summarize(&records);
    if options.require_monitored && summary.count_monitored == 0 {
        return Err(EmptyReportError {
            total: summary.count,
        });
    }

    let top_consumers = rank_top_consumers(&records, options.top_n);

    info!(
        "Finalized report: {} records, {} monitored",
        summary.count, summary.count_monitored
    );

    Ok(SessionReport {
        schema_version: SCHEMA_VERSION,
        started_at,
        device,
        parallel_workers,
        summary,
        top_consumers,
        records,
    })
}

/// Compute summary statistics over `records`
pub fn summarize(records: &[UnitRecord]) -> SessionSummary {
    let mut summary = SessionSummary {
        count: records.len(),
        ..SessionSummary::default()
    };

    for record in records {
        summary.total_duration_seconds += record.duration_seconds;
        if record.incomplete {
            summary.count_incomplete += 1;
        }
        if record.is_rankable() {
            summary.count_monitored += 1;
            summary.total_peak_allocated = summary
                .total_peak_allocated
                .saturating_add(record.peak_allocated);
            summary.max_peak_allocated = summary.max_peak_allocated.max(record.peak_allocated);
        }
    }

    if summary.count_monitored > 0 {
        summary.average_peak_allocated =
            summary.total_peak_allocated as f64 / summary.count_monitored as f64;
    }

    summary
}

/// Ids of the `n` monitored records with the highest peak, descending.
/// Ties keep execution order.
pub fn rank_top_consumers(records: &[UnitRecord], n: usize) -> Vec<String> {
    let mut ranked: Vec<usize> = records
        .iter()
        .enumerate()
        .filter(|(_, r)| r.is_rankable())
        .map(|(i, _)| i)
        .collect();

    ranked.sort_by(|&a, &b| {
        records[b]
            .peak_allocated
            .cmp(&records[a].peak_allocated)
            .then(a.cmp(&b))
    });

    ranked
        .into_iter()
        .take(n)
        .map(|i| records[i].id.clone())
        .collect()
}

fn close_dangling(pending: PendingUnit) -> UnitRecord {
    let mut record = if pending.monitored {
        let readings = MemoryReadings {
            initial_allocated: pending.initial_allocated,
            initial_reserved: pending.initial_reserved,
            final_allocated: pending.initial_allocated,
            final_reserved: pending.initial_reserved,
            peak_allocated: pending.initial_allocated,
            peak_reserved: pending.initial_reserved,
        };
        UnitRecord::measured(
            pending.id,
            UnitStatus::Error,
            readings,
            pending.elapsed_seconds,
            pending.worker_id,
            pending.started_at,
        )
    } else {
        UnitRecord::unmonitored(
            pending.id,
            UnitStatus::Error,
            pending.worker_id,
            pending.started_at,
        )
    };
    record.incomplete = true;
    record
}
