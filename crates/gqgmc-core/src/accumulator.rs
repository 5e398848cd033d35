//! Running average of CPM samples (ACPM)
//!
//! Append-only for the lifetime of the process: there is no reset, and the
//! mean covers every sample since start-up. The count is 32-bit and the total
//! 64-bit; at one sample a minute neither overflows in practice, but the f32
//! mean loses precision once the total passes 2^24.

use serde::{Deserialize, Serialize};

/// Cumulative sample count and total
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunningAverage {
    count: u32,
    total: u64,
}

impl RunningAverage {
    /// Empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one CPM sample into the running totals
    pub fn fold(&mut self, sample: u16) {
        self.count = self.count.saturating_add(1);
        self.total = self.total.saturating_add(u64::from(sample));
    }

    /// Number of samples folded so far
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Sum of all samples folded so far
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Mean CPM, or `None` before the first sample
    pub fn mean(&self) -> Option<f32> {
        if self.count == 0 {
            return None;
        }
        Some(self.total as f32 / self.count as f32)
    }
}
