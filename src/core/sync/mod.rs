/*!
 * Synchronization Primitives
 *
 * Building blocks for concurrent runtimes:
 * - Adaptive mutex with starvation mode
 * - Lock-free MPMC queue
 * - Owner/stealer ring deque and its unbounded chain
 *
 * # Architecture
 *
 * The mutex keeps its whole protocol in one atomic state word and parks
 * losers on a FIFO semaphore built on `parking_lot_core`. The lock-free
 * structures reclaim memory through `crossbeam-epoch`.
 *
 * # Performance
 *
 * - Uncontended lock and unlock are a single CAS / fetch_sub
 * - Hot atomics are cache-line aligned to prevent false sharing
 * - Owner operations on the deques touch no shared cache line but the index word
 */

mod config;
mod lockfree;
mod locks;
mod sema;
mod spinwait;

pub use config::{ChainConfig, MutexConfig, MAX_SEGMENT_CAPACITY};
pub use lockfree::{ChainStealer, DequeChain, MpmcQueue, RingDeque};
pub use locks::{AdaptiveMutex, AdaptiveMutexGuard, RawAdaptiveMutex};
pub use sema::Semaphore;
