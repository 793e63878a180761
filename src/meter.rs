use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use crate::scheduler::MAX_GRAINS;

// -------------------------------------------------------------------------------------------------

/// Thread-safe, lock-free view on the number of active grains of a
/// [`GrainScheduler`](crate::GrainScheduler).
///
/// The scheduler publishes the count after every processed block. Displays poll it at their
/// own refresh rate; the value never feeds back into synthesis.
#[derive(Debug, Clone, Default)]
pub struct GrainMeter {
    active_grains: Arc<AtomicUsize>,
}

impl GrainMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of grains which were active at the end of the last processed block.
    pub fn active_grains(&self) -> usize {
        self.active_grains.load(Ordering::Relaxed)
    }

    /// Active grains relative to the grain pool's capacity, in range `0.0..=1.0`.
    pub fn load(&self) -> f32 {
        self.active_grains() as f32 / MAX_GRAINS as f32
    }

    pub(crate) fn set_active_grains(&self, count: usize) {
        debug_assert!(count <= MAX_GRAINS, "Invalid grain count");
        self.active_grains.store(count, Ordering::Relaxed);
    }
}

// -------------------------------------------------------------------------------------------------
