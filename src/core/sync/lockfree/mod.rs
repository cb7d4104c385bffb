/*!
 * Lock-Free Data Structures
 *
 * Queues and deques that never block:
 * - MPMC queue (Michael-Scott linked list, epoch reclamation)
 * - Ring deque (fixed capacity, one owner, many stealers)
 * - Deque chain (unbounded ring deques of doubling size)
 */

mod chain;
mod mpmc;
mod ring_deque;

use std::ops::Deref;

// Re-export public API
pub use chain::{ChainStealer, DequeChain};
pub use mpmc::MpmcQueue;
pub use ring_deque::RingDeque;

/// Pads a hot atomic to its own cache line to prevent false sharing
#[repr(C, align(64))]
#[derive(Debug, Default)]
pub(crate) struct CacheAligned<T>(T);

impl<T> CacheAligned<T> {
    #[inline]
    pub(crate) const fn new(value: T) -> Self {
        Self(value)
    }
}

impl<T> Deref for CacheAligned<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.0
    }
}
