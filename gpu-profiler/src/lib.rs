//! GPU memory collection
//!
//! Brackets units of work with reads of a device's memory counters and turns
//! them into [`UnitRecord`](gpumon_shared::UnitRecord)s.

pub mod clock;
pub mod collector;
pub mod harness;
pub mod simulated;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use collector::{Collector, CollectorStateError};
pub use harness::Harness;
pub use simulated::SimulatedDevice;

use gpumon_shared::DeviceInfo;

/// Source of device memory counters.
///
/// Counters are process-wide state on a real device: `reset_peak_counters`
/// affects every reader, which is why the collector allows only one open
/// unit at a time.
pub trait StatsProvider {
    /// Whether a device is present and counters can be read
    fn is_available(&self) -> bool;

    /// Reset peak counters to the current usage
    fn reset_peak_counters(&self);

    /// Bytes currently allocated
    fn current_allocated(&self) -> u64;

    /// Bytes currently reserved by the allocator
    fn current_reserved(&self) -> u64;

    /// Highest allocated bytes since the last reset
    fn peak_allocated(&self) -> u64;

    /// Highest reserved bytes since the last reset
    fn peak_reserved(&self) -> u64;

    /// Device name and total memory, if a device is present
    fn device_description(&self) -> Option<DeviceInfo>;

    /// Wait for outstanding device work so counters are settled
    fn synchronize(&self) {}

    /// Return cached but unused blocks to the device
    fn release_cached(&self) {}
}

/// Provider for hosts without an accelerator
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProvider;

impl StatsProvider for NullProvider {
    fn is_available(&self) -> bool {
        false
    }

    fn reset_peak_counters(&self) {}

    fn current_allocated(&self) -> u64 {
        0
    }

    fn current_reserved(&self) -> u64 {
        0
    }

    fn peak_allocated(&self) -> u64 {
        0
    }

    fn peak_reserved(&self) -> u64 {
        0
    }

    fn device_description(&self) -> Option<DeviceInfo> {
        None
    }
}

impl<P: StatsProvider + ?Sized> StatsProvider for Box<P> {
    fn is_available(&self) -> bool {
        (**self).is_available()
    }

    fn reset_peak_counters(&self) {
        (**self).reset_peak_counters()
    }

    fn current_allocated(&self) -> u64 {
        (**self).current_allocated()
    }

    fn current_reserved(&self) -> u64 {
        (**self).current_reserved()
    }

    fn peak_allocated(&self) -> u64 {
        (**self).peak_allocated()
    }

    fn peak_reserved(&self) -> u64 {
        (**self).peak_reserved()
    }

    fn device_description(&self) -> Option<DeviceInfo> {
        (**self).device_description()
    }

    fn synchronize(&self) {
        (**self).synchronize()
    }

    fn release_cached(&self) {
        (**self).release_cached()
    }
}
