/*!
 * Lock-Based Synchronization Primitives
 *
 * Adaptive mutex: spins briefly under contention, parks otherwise, and
 * switches to FIFO handoff when a waiter has been starved.
 */

mod adaptive;

// Re-export public API
pub use adaptive::{AdaptiveMutex, AdaptiveMutexGuard, RawAdaptiveMutex};
