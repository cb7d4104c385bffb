/*!
 * Core Traits
 * Abstractions shared by the queue implementations
 */

use crate::core::sync::MpmcQueue;
use crossbeam_queue::SegQueue;

/// Unbounded multi-producer multi-consumer FIFO queue
///
/// Lets workloads and benchmarks swap queue implementations without
/// changing call sites.
pub trait ConcurrentQueue<T>: Send + Sync {
    /// Append a value at the tail
    fn push(&self, value: T);

    /// Remove the value at the head, `None` when empty
    fn pop(&self) -> Option<T>;

    /// Whether the queue currently holds no values
    fn is_empty(&self) -> bool;

    /// Implementation name for logs and benchmark labels
    fn name(&self) -> &'static str;
}

impl<T: Send> ConcurrentQueue<T> for MpmcQueue<T> {
    #[inline]
    fn push(&self, value: T) {
        self.enqueue(value);
    }

    #[inline]
    fn pop(&self) -> Option<T> {
        self.dequeue()
    }

    #[inline]
    fn is_empty(&self) -> bool {
        MpmcQueue::is_empty(self)
    }

    fn name(&self) -> &'static str {
        "mpmc"
    }
}

impl<T: Send> ConcurrentQueue<T> for SegQueue<T> {
    #[inline]
    fn push(&self, value: T) {
        SegQueue::push(self, value);
    }

    #[inline]
    fn pop(&self) -> Option<T> {
        SegQueue::pop(self)
    }

    #[inline]
    fn is_empty(&self) -> bool {
        SegQueue::is_empty(self)
    }

    fn name(&self) -> &'static str {
        "seg_queue"
    }
}
