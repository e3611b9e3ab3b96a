//! In-memory device with a caching allocator
//!
//! Models the counters a GPU runtime exposes: allocated bytes, bytes reserved
//! by the caching allocator (rounded up to whole blocks), and peak values of
//! both since the last reset. Used by tests and the `demo` command.

use gpumon_shared::DeviceInfo;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::debug;

use crate::StatsProvider;

/// Allocator block granularity
pub const BLOCK_SIZE: u64 = 2 * 1024 * 1024;

/// Allocation would exceed device memory
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("out of device memory: requested {requested} bytes with {allocated} of {total} allocated")]
pub struct OutOfMemory {
    pub requested: u64,
    pub allocated: u64,
    pub total: u64,
}

#[derive(Debug, Default)]
struct DeviceState {
    allocated: u64,
    reserved: u64,
    peak_allocated: u64,
    peak_reserved: u64,
}

/// Simulated accelerator. Clones share the same counters.
#[derive(Debug, Clone)]
pub struct SimulatedDevice {
    name: String,
    total_memory: u64,
    available: bool,
    state: Arc<Mutex<DeviceState>>,
}

impl SimulatedDevice {
    /// Create an available device
    pub fn new(name: impl Into<String>, total_memory: u64) -> Self {
        Self {
            name: name.into(),
            total_memory,
            available: true,
            state: Arc::new(Mutex::new(DeviceState::default())),
        }
    }

    /// Create a device that reports itself unavailable
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new("unavailable", 0)
        }
    }

    fn state(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocate `bytes`, growing the reserved pool in whole blocks
    pub fn allocate(&self, bytes: u64) -> Result<(), OutOfMemory> {
        let mut state = self.state();
        let allocated = state.allocated.saturating_add(bytes);
        let reserved = state.reserved.max(round_up(allocated));

        if reserved > self.total_memory {
            return Err(OutOfMemory {
                requested: bytes,
                allocated: state.allocated,
                total: self.total_memory,
            });
        }

        state.allocated = allocated;
        state.reserved = reserved;
        state.peak_allocated = state.peak_allocated.max(allocated);
        state.peak_reserved = state.peak_reserved.max(reserved);
        debug!("allocate {} bytes -> allocated={} reserved={}", bytes, allocated, reserved);
        Ok(())
    }

    /// Free `bytes`. Reserved memory stays cached until [`release_cached`](StatsProvider::release_cached).
    pub fn free(&self, bytes: u64) {
        let mut state = self.state();
        state.allocated = state.allocated.saturating_sub(bytes);
    }

    /// Bytes currently allocated
    pub fn allocated(&self) -> u64 {
        self.state().allocated
    }
}

impl StatsProvider for SimulatedDevice {
    fn is_available(&self) -> bool {
        self.available
    }

    fn reset_peak_counters(&self) {
        let mut state = self.state();
        state.peak_allocated = state.allocated;
        state.peak_reserved = state.reserved;
    }

    fn current_allocated(&self) -> u64 {
        self.state().allocated
    }

    fn current_reserved(&self) -> u64 {
        self.state().reserved
    }

    fn peak_allocated(&self) -> u64 {
        self.state().peak_allocated
    }

    fn peak_reserved(&self) -> u64 {
        self.state().peak_reserved
    }

    fn device_description(&self) -> Option<DeviceInfo> {
        self.available.then(|| DeviceInfo {
            name: self.name.clone(),
            total_memory: self.total_memory,
        })
    }

    fn release_cached(&self) {
        let mut state = self.state();
        state.reserved = round_up(state.allocated);
    }
}

fn round_up(bytes: u64) -> u64 {
    bytes.div_ceil(BLOCK_SIZE).saturating_mul(BLOCK_SIZE)
}
