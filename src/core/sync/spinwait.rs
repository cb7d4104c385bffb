/*!
 * Bounded Spin Policy
 *
 * Decides whether a lock contender should busy-wait a little longer or park.
 * Spinning only pays off when the owner can make progress on another core,
 * so single-CPU hosts never spin.
 */

use super::config::MutexConfig;
use crate::core::hints;
use std::sync::OnceLock;
use std::thread;

/// Whether more than one CPU is available to this process (cached)
fn is_multicore() -> bool {
    static MULTICORE: OnceLock<bool> = OnceLock::new();
    *MULTICORE.get_or_init(|| {
        thread::available_parallelism()
            .map(|n| n.get() > 1)
            .unwrap_or(false)
    })
}

/// Spin budget for one lock acquisition
#[derive(Debug, Clone, Copy)]
pub(crate) struct SpinPolicy {
    limit: u32,
    cycles: u32,
}

impl SpinPolicy {
    pub(crate) const fn new(config: &MutexConfig) -> Self {
        Self {
            limit: config.spin_limit,
            cycles: config.spin_cycles,
        }
    }

    /// May the caller spin for round `iter` (0-based)?
    #[inline]
    pub(crate) fn can_spin(&self, iter: u32) -> bool {
        iter < self.limit && is_multicore()
    }

    /// One spin round
    #[inline]
    pub(crate) fn spin(&self) {
        hints::relax(self.cycles);
    }
}
