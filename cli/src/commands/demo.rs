//! Demo command implementation
//!
//! Runs a fixed plan of units against a simulated device, so the whole
//! pipeline (collection, aggregation, every report format) can be tried
//! without an accelerator.

use anyhow::{Context, Result};
use clap::Args;
use gpumon_gpu::{
    Collector, Harness, ManualClock, NullProvider, SimulatedDevice, StatsProvider,
};
use gpumon_report::config::MonitorConfig;
use gpumon_report::finalize;
use gpumon_report::spool::{spool_dir, spool_record};
use gpumon_shared::utils::{parse_size, MIB};
use gpumon_shared::CollectedSession;
use std::time::Duration;
use tracing::info;

use crate::{console, output};

#[derive(Args, Debug, Clone)]
pub struct DemoArgs {
    /// Run without an accelerator; every unit is recorded unmonitored
    #[arg(long)]
    pub no_accelerator: bool,

    /// Name of the simulated device
    #[arg(long, default_value = "Simulated GPU")]
    pub device_name: String,

    /// Memory of the simulated device (e.g., "24GB", "8GiB")
    #[arg(long, default_value = "24GB")]
    pub device_memory: String,

    /// Spool records as this worker instead of writing reports (see `merge`)
    #[arg(long, value_name = "WORKER_ID")]
    pub worker: Option<String>,
}

impl Default for DemoArgs {
    fn default() -> Self {
        Self {
            no_accelerator: false,
            device_name: "Simulated GPU".to_string(),
            device_memory: "24GB".to_string(),
            worker: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Outcome {
    Pass,
    Fail(&'static str),
    Skip(&'static str),
}

#[derive(Debug, Clone, Copy)]
struct PlannedUnit {
    id: &'static str,
    allocate_mib: u64,
    free_mib: u64,
    millis: u64,
    outcome: Outcome,
}

const fn unit(
    id: &'static str,
    allocate_mib: u64,
    free_mib: u64,
    millis: u64,
    outcome: Outcome,
) -> PlannedUnit {
    PlannedUnit {
        id,
        allocate_mib,
        free_mib,
        millis,
        outcome,
    }
}

const PLAN: &[PlannedUnit] = &[
    unit("tests/test_model.py::test_forward", 120, 120, 350, Outcome::Pass),
    unit("tests/test_model.py::test_backward", 640, 512, 820, Outcome::Pass),
    unit("tests/test_model.py::test_large_batch", 1536, 1536, 1900, Outcome::Pass),
    unit("tests/test_data.py::test_loader", 12, 12, 90, Outcome::Pass),
    unit(
        "tests/test_io.py::test_remote_checkpoint",
        0,
        0,
        0,
        Outcome::Skip("requires network access"),
    ),
    // Larger than any device; fails with out-of-memory
    unit("tests/test_model.py::test_huge_batch", 1 << 20, 0, 40, Outcome::Pass),
    unit(
        "tests/test_model.py::test_convergence",
        256,
        256,
        600,
        Outcome::Fail("loss did not decrease"),
    ),
    // Rerun of an earlier unit
    unit("tests/test_model.py::test_backward", 640, 640, 790, Outcome::Pass),
];

pub fn run(args: DemoArgs, config: &MonitorConfig) -> Result<()> {
    let total_memory = parse_size(&args.device_memory).context("Invalid --device-memory")?;
    let device = SimulatedDevice::new(args.device_name.clone(), total_memory);

    let provider: Box<dyn StatsProvider> = if args.no_accelerator {
        Box::new(NullProvider)
    } else {
        Box::new(device.clone())
    };

    let session = run_plan(provider, device, args.worker.as_deref(), config.print_summary)?;

    if let Some(worker) = &args.worker {
        for record in &session.records {
            spool_record(&config.report_dir, record)?;
        }
        output::success(&format!(
            "Worker {} spooled {} records to {}",
            worker,
            session.records.len(),
            spool_dir(&config.report_dir).display()
        ));
        return Ok(());
    }

    let report = finalize(session, &config.finalize_options())?;
    super::write_and_summarize(&report, config)?;
    Ok(())
}

fn run_plan(
    provider: Box<dyn StatsProvider>,
    device: SimulatedDevice,
    worker: Option<&str>,
    print_units: bool,
) -> Result<CollectedSession> {
    let clock = ManualClock::new();
    let mut collector = Collector::with_clock(provider, clock.clone());
    if let Some(worker) = worker {
        collector = collector.with_worker_id(worker);
    }

    if print_units {
        console::device_banner(collector.device());
    }

    let mut harness = Harness::new(collector);
    if print_units {
        harness = harness.on_record(console::print_unit);
    }

    for planned in PLAN {
        if let Outcome::Skip(reason) = planned.outcome {
            harness.skip(planned.id, reason);
            continue;
        }

        let device = device.clone();
        let clock = clock.clone();
        let planned = *planned;
        harness.run_unit(planned.id, move || -> Result<(), String> {
            clock.advance(Duration::from_millis(planned.millis));
            device
                .allocate(planned.allocate_mib.saturating_mul(MIB))
                .map_err(|e| e.to_string())?;
            device.free(planned.free_mib.saturating_mul(MIB));
            match planned.outcome {
                Outcome::Fail(reason) => Err(reason.to_string()),
                _ => Ok(()),
            }
        })?;
    }

    let session = harness.finish();
    info!("Demo session finished with {} records", session.records.len());
    Ok(session)
}
