/*!
 * Lock-Free MPMC Queue
 *
 * Unbounded Michael-Scott queue with epoch-based reclamation.
 *
 * # Design
 *
 * - The head always points at a sentinel node whose value slot is dead
 * - Enqueue CAS-links a node after the tail, then swings the tail;
 *   any thread that finds the tail lagging helps it forward
 * - Dequeue CAS-moves the head to the next node, takes that node's value,
 *   and retires the old sentinel through crossbeam-epoch
 *
 * # Reclamation
 *
 * Every operation runs pinned. A node is retired only after the head has
 * moved past it and the tail no longer references it, so a thread that
 * pins afterwards cannot reach it.
 */

use super::CacheAligned;
use crossbeam_epoch::{self as epoch, Atomic, Guard, Owned, Shared};
use std::fmt;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicIsize, Ordering};

struct Node<T> {
    /// Initialized on every node except the current sentinel
    value: MaybeUninit<T>,
    next: Atomic<Node<T>>,
}

impl<T> Node<T> {
    fn sentinel() -> Self {
        Self {
            value: MaybeUninit::uninit(),
            next: Atomic::null(),
        }
    }

    fn with_value(value: T) -> Self {
        Self {
            value: MaybeUninit::new(value),
            next: Atomic::null(),
        }
    }
}

/// Unbounded multi-producer multi-consumer queue
///
/// # Performance
///
/// - **Enqueue/Dequeue**: lock-free, one allocation per value
/// - **Contention**: failed CAS attempts are retried, never surfaced
///
/// # Example
///
/// ```
/// use adaptive_sync::core::sync::MpmcQueue;
///
/// let queue = MpmcQueue::new();
/// queue.enqueue(1);
/// queue.enqueue(2);
/// assert_eq!(queue.dequeue(), Some(1));
/// assert_eq!(queue.dequeue(), Some(2));
/// assert_eq!(queue.dequeue(), None);
/// ```
pub struct MpmcQueue<T> {
    head: CacheAligned<Atomic<Node<T>>>,
    tail: CacheAligned<Atomic<Node<T>>>,
    /// Signed: a dequeue can be counted before the matching enqueue
    len: AtomicIsize,
}

// Safety: values move between threads through the queue; nodes are only
// shared through epoch-protected pointers.
unsafe impl<T: Send> Send for MpmcQueue<T> {}
unsafe impl<T: Send> Sync for MpmcQueue<T> {}

impl<T> MpmcQueue<T> {
    pub fn new() -> Self {
        let queue = Self {
            head: CacheAligned::new(Atomic::null()),
            tail: CacheAligned::new(Atomic::null()),
            len: AtomicIsize::new(0),
        };

        // Not yet shared, no pin needed
        let sentinel = Owned::new(Node::sentinel()).into_shared(unsafe { epoch::unprotected() });
        queue.head.store(sentinel, Ordering::Relaxed);
        queue.tail.store(sentinel, Ordering::Relaxed);
        queue
    }

    /// Append a value
    ///
    /// Returns the approximate queue length right after the insert.
    pub fn enqueue(&self, value: T) -> usize {
        let guard = &epoch::pin();
        let node = Owned::new(Node::with_value(value)).into_shared(guard);
        while !self.try_link(node, guard) {}
        self.bump_len()
    }

    /// Append a value from the only producer, without CAS or retry
    ///
    /// Returns the approximate queue length right after the insert.
    ///
    /// # Safety
    ///
    /// No other thread may run `enqueue` or `enqueue_lone` on this queue
    /// while this call is in progress. Consumers may run concurrently.
    pub unsafe fn enqueue_lone(&self, value: T) -> usize {
        let guard = &epoch::pin();
        let node = Owned::new(Node::with_value(value)).into_shared(guard);

        // With a single producer the tail is never left lagging between
        // calls, so its `next` is null and only this thread writes it.
        let tail = self.tail.load(Ordering::Acquire, guard);
        let tail_ref = tail.deref();
        debug_assert!(tail_ref.next.load(Ordering::Relaxed, guard).is_null());
        tail_ref.next.store(node, Ordering::Release);
        // Consumers helping the tail can only move it to this same node
        self.tail.store(node, Ordering::Release);

        self.bump_len()
    }

    /// Remove the oldest value, or `None` if the queue is empty
    pub fn dequeue(&self) -> Option<T> {
        let guard = &epoch::pin();
        self.pop(guard)
    }

    /// Approximate number of queued values
    #[inline]
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed).max(0) as usize
    }

    #[inline]
    fn bump_len(&self) -> usize {
        (self.len.fetch_add(1, Ordering::Relaxed) + 1).max(1) as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        let guard = &epoch::pin();
        let head = self.head.load(Ordering::Acquire, guard);
        unsafe { head.deref() }.next.load(Ordering::Acquire, guard).is_null()
    }

    /// One attempt to link `node` after the current tail
    ///
    /// Returns false when the tail moved underneath us (after helping it
    /// forward if it was lagging).
    fn try_link(&self, node: Shared<'_, Node<T>>, guard: &Guard) -> bool {
        let tail = self.tail.load(Ordering::Acquire, guard);
        // Tail is never null and never retired while reachable from it
        let tail_ref = unsafe { tail.deref() };
        let next = tail_ref.next.load(Ordering::Acquire, guard);

        if !next.is_null() {
            let _ = self
                .tail
                .compare_exchange(tail, next, Ordering::Release, Ordering::Relaxed, guard);
            return false;
        }

        let linked = tail_ref
            .next
            .compare_exchange(Shared::null(), node, Ordering::Release, Ordering::Relaxed, guard)
            .is_ok();
        if linked {
            let _ = self
                .tail
                .compare_exchange(tail, node, Ordering::Release, Ordering::Relaxed, guard);
        }
        linked
    }

    fn pop(&self, guard: &Guard) -> Option<T> {
        loop {
            let head = self.head.load(Ordering::Acquire, guard);
            let next = unsafe { head.deref() }.next.load(Ordering::Acquire, guard);
            let next_ref = unsafe { next.as_ref() }?;

            if self
                .head
                .compare_exchange(head, next, Ordering::Release, Ordering::Relaxed, guard)
                .is_ok()
            {
                // The tail may still point at the old sentinel; move it off
                // before retiring the node.
                let tail = self.tail.load(Ordering::Relaxed, guard);
                if head == tail {
                    let _ = self.tail.compare_exchange(
                        tail,
                        next,
                        Ordering::Release,
                        Ordering::Relaxed,
                        guard,
                    );
                }

                unsafe { guard.defer_destroy(head) };
                self.len.fetch_sub(1, Ordering::Relaxed);
                // `next` is the new sentinel; its value is ours alone now
                return Some(unsafe { next_ref.value.assume_init_read() });
            }
        }
    }
}

impl<T: Copy> MpmcQueue<T> {
    /// Visit queued values oldest first until `visitor` returns false
    ///
    /// Best effort: values enqueued or dequeued during the walk may or may
    /// not be seen. Limited to `Copy` values because a concurrent dequeue
    /// takes ownership of the value being visited.
    pub fn range<F>(&self, mut visitor: F)
    where
        F: FnMut(T) -> bool,
    {
        let guard = &epoch::pin();
        let head = self.head.load(Ordering::Acquire, guard);
        let mut current = unsafe { head.deref() }.next.load(Ordering::Acquire, guard);

        while let Some(node) = unsafe { current.as_ref() } {
            let value = unsafe { node.value.assume_init_read() };
            if !visitor(value) {
                break;
            }
            current = node.next.load(Ordering::Acquire, guard);
        }
    }
}

impl<T> Default for MpmcQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for MpmcQueue<T> {
    fn drop(&mut self) {
        unsafe {
            // Exclusive access: reclamation can run immediately
            let guard = epoch::unprotected();
            while self.pop(guard).is_some() {}

            let sentinel = self.head.load(Ordering::Relaxed, guard);
            drop(sentinel.into_owned());
        }
    }
}

impl<T> fmt::Debug for MpmcQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MpmcQueue").field("len", &self.len()).finish()
    }
}
