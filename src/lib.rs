/*!
 * Adaptive Sync Library
 * Adaptive mutex and lock-free queues for concurrent runtimes
 */

pub mod core;
pub mod monitoring;

// Re-exports
pub use crate::core::errors::{SyncError, SyncResult};
pub use crate::core::sync::{
    AdaptiveMutex, AdaptiveMutexGuard, ChainConfig, ChainStealer, DequeChain, MpmcQueue,
    MutexConfig, RawAdaptiveMutex, RingDeque,
};
pub use crate::core::traits::ConcurrentQueue;
pub use monitoring::{init_tracing, try_init_tracing};
