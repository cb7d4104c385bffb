/*!
 * Synchronization Configuration
 *
 * Tunables for the adaptive mutex and the deque chain
 */

use crate::core::errors::{SyncError, SyncResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Largest ring segment a chain will allocate (2^30 slots)
pub const MAX_SEGMENT_CAPACITY: usize = 1 << 30;

/// Adaptive mutex tuning
///
/// The starvation threshold and spin budget are tunables, not part of the
/// mutual-exclusion contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MutexConfig {
    /// Spin rounds before a contender parks
    pub spin_limit: u32,
    /// CPU relax hints per spin round
    pub spin_cycles: u32,
    /// Wait time after which a parked waiter flips the lock into starvation mode
    pub starvation_threshold: Duration,
}

impl Default for MutexConfig {
    fn default() -> Self {
        Self::standard()
    }
}

impl MutexConfig {
    /// Four spin rounds of 30 relax hints, 1ms starvation threshold
    pub const fn standard() -> Self {
        Self {
            spin_limit: 4,
            spin_cycles: 30,
            starvation_threshold: Duration::from_millis(1),
        }
    }

    /// Spin longer before parking (critical sections of a few microseconds)
    pub const fn low_latency() -> Self {
        Self {
            spin_limit: 16,
            spin_cycles: 64,
            starvation_threshold: Duration::from_millis(1),
        }
    }

    /// Never spin and switch to FIFO handoff quickly
    pub const fn strict_fairness() -> Self {
        Self {
            spin_limit: 0,
            spin_cycles: 1,
            starvation_threshold: Duration::from_micros(100),
        }
    }

    pub fn validate(&self) -> SyncResult<()> {
        if self.spin_limit > 0 && self.spin_cycles == 0 {
            return Err(SyncError::InvalidConfig(
                "spin_cycles must be non-zero when spinning is enabled".into(),
            ));
        }
        if self.starvation_threshold.is_zero() {
            return Err(SyncError::InvalidConfig(
                "starvation_threshold must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// Deque chain growth parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Capacity of the first segment
    pub initial_capacity: usize,
    /// Upper bound on the capacity of any later segment
    pub max_segment_capacity: usize,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 8,
            max_segment_capacity: MAX_SEGMENT_CAPACITY,
        }
    }
}

impl ChainConfig {
    pub fn validate(&self) -> SyncResult<()> {
        check_ring_capacity(self.initial_capacity)?;
        check_ring_capacity(self.max_segment_capacity)?;
        if self.initial_capacity > self.max_segment_capacity {
            return Err(SyncError::InvalidConfig(format!(
                "initial_capacity {} exceeds max_segment_capacity {}",
                self.initial_capacity, self.max_segment_capacity
            )));
        }
        Ok(())
    }

    /// Capacity of the segment allocated after one of `current` slots
    #[inline]
    pub fn next_capacity(&self, current: usize) -> usize {
        current.saturating_mul(2).min(self.max_segment_capacity)
    }
}

/// Validate a ring deque capacity
pub(crate) fn check_ring_capacity(capacity: usize) -> SyncResult<()> {
    if capacity == 0 {
        return Err(SyncError::capacity(capacity, "capacity is zero"));
    }
    if !capacity.is_power_of_two() {
        return Err(SyncError::capacity(capacity, "not a power of two"));
    }
    if capacity > MAX_SEGMENT_CAPACITY {
        return Err(SyncError::capacity(capacity, "exceeds 2^30 slots"));
    }
    Ok(())
}
