/*!
 * Deque Chain
 *
 * Unbounded owner/stealer deque built from ring segments of doubling
 * capacity. Backs per-worker object caches: the owning worker pushes and
 * pops at the head without contention, idle workers steal from the tail.
 *
 * # Layout
 *
 * ```text
 *   tail                                   head (owner)
 *    |                                      |
 *    v                                      v
 *  [ 8 ] --next--> [ 16 ] --next--> ... [ 2^k ]
 *        <--prev--        <--prev--
 * ```
 *
 * - Only the head segment is pushed to. When it is full a segment of twice
 *   the capacity (capped) becomes the new head.
 * - A segment with a successor never receives pushes again, so once it is
 *   seen empty it stays empty. Such a segment is unlinked from the tail and
 *   retired through crossbeam-epoch.
 *
 * # Reclamation
 *
 * Unlinking swings the chain tail, clears the successor's `prev`, and only
 * then retires the old segment, so no thread that pins afterwards can reach
 * it. Threads that were already pinned may still read it safely.
 */

use super::ring_deque::RingDeque;
use super::CacheAligned;
use crate::core::errors::SyncResult;
use crate::core::sync::config::ChainConfig;
use crossbeam_epoch::{self as epoch, Atomic, Guard, Owned, Shared};
use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::trace;

struct Segment<T> {
    ring: RingDeque<T>,
    /// Newer segment (towards the head); written once by the owner
    next: Atomic<Segment<T>>,
    /// Older segment (towards the tail); cleared when that segment is unlinked
    prev: Atomic<Segment<T>>,
}

impl<T> Segment<T> {
    fn new(capacity: usize) -> Self {
        Self {
            ring: RingDeque::allocate(capacity),
            next: Atomic::null(),
            prev: Atomic::null(),
        }
    }
}

/// State shared between the owner and its stealers
struct ChainShared<T> {
    tail: CacheAligned<Atomic<Segment<T>>>,
    allocated: AtomicUsize,
    live: AtomicUsize,
}

impl<T> ChainShared<T> {
    fn pop_tail(&self) -> Option<T> {
        let guard = &epoch::pin();
        let mut segment = self.tail.load(Ordering::Acquire, guard);

        loop {
            let segment_ref = unsafe { segment.as_ref() }?;

            // Load `next` before popping: if it is set and the pop then
            // fails, the segment is permanently empty.
            let next = segment_ref.next.load(Ordering::Acquire, guard);
            if let Some(value) = segment_ref.ring.pop_tail() {
                return Some(value);
            }
            if next.is_null() {
                return None;
            }

            self.unlink_tail(segment, next, guard);
            segment = next;
        }
    }

    /// Advance the chain tail past a drained `segment`
    ///
    /// Loses silently if another thread already moved the tail.
    fn unlink_tail<'g>(
        &self,
        segment: Shared<'g, Segment<T>>,
        next: Shared<'g, Segment<T>>,
        guard: &'g Guard,
    ) {
        if self
            .tail
            .compare_exchange(segment, next, Ordering::AcqRel, Ordering::Acquire, guard)
            .is_err()
        {
            return;
        }

        unsafe {
            next.deref().prev.store(Shared::null(), Ordering::Release);
            guard.defer_destroy(segment);
        }
        let live = self.live.fetch_sub(1, Ordering::Relaxed) - 1;
        trace!(live_segments = live, "retired drained chain segment");
    }

    /// Unlink drained segments from the tail until reaching one that
    /// still holds values or is `head`
    fn compact_tail<'g>(&self, head: Shared<'g, Segment<T>>, guard: &'g Guard) {
        loop {
            let tail = self.tail.load(Ordering::Acquire, guard);
            if tail == head {
                return;
            }

            // Tail is never null; a segment behind the head always has a successor
            let tail_ref = unsafe { tail.deref() };
            let next = tail_ref.next.load(Ordering::Acquire, guard);
            if next.is_null() || !tail_ref.ring.is_empty() {
                return;
            }
            self.unlink_tail(tail, next, guard);
        }
    }

    fn len(&self) -> usize {
        let guard = &epoch::pin();
        let mut total = 0;
        let mut segment = self.tail.load(Ordering::Acquire, guard);
        while let Some(segment_ref) = unsafe { segment.as_ref() } {
            total += segment_ref.ring.len();
            segment = segment_ref.next.load(Ordering::Acquire, guard);
        }
        total
    }
}

impl<T> Drop for ChainShared<T> {
    fn drop(&mut self) {
        unsafe {
            // Last handle gone: every live segment hangs off the tail
            let guard = epoch::unprotected();
            let mut segment = self.tail.load(Ordering::Relaxed, guard);
            while !segment.is_null() {
                let next = segment.deref().next.load(Ordering::Relaxed, guard);
                drop(segment.into_owned());
                segment = next;
            }
        }
    }
}

/// Owner handle of a deque chain
///
/// `Send` but not `Sync`: exactly one thread at a time pushes and pops at
/// the head. Hand out [`ChainStealer`]s for other threads.
///
/// # Example
///
/// ```
/// use adaptive_sync::core::sync::DequeChain;
///
/// let chain = DequeChain::new();
/// for i in 0..100 {
///     chain.push_head(i);
/// }
///
/// let stealer = chain.stealer();
/// assert_eq!(stealer.pop_tail(), Some(0));
/// assert_eq!(chain.pop_head(), Some(99));
/// ```
pub struct DequeChain<T> {
    shared: Arc<ChainShared<T>>,
    /// Newest segment; never unlinked while it is the head
    head: Atomic<Segment<T>>,
    config: ChainConfig,
    _not_sync: PhantomData<Cell<()>>,
}

impl<T> DequeChain<T> {
    /// Chain whose first segment holds 8 values
    pub fn new() -> Self {
        Self::build(ChainConfig::default())
    }

    pub fn with_config(config: ChainConfig) -> SyncResult<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: ChainConfig) -> Self {
        let first = Owned::new(Segment::new(config.initial_capacity))
            .into_shared(unsafe { epoch::unprotected() });

        let shared = ChainShared {
            tail: CacheAligned::new(Atomic::null()),
            allocated: AtomicUsize::new(1),
            live: AtomicUsize::new(1),
        };
        shared.tail.store(first, Ordering::Relaxed);

        let head = Atomic::null();
        head.store(first, Ordering::Relaxed);

        Self {
            shared: Arc::new(shared),
            head,
            config,
            _not_sync: PhantomData,
        }
    }

    /// Push at the head, growing the chain when the head segment is full
    pub fn push_head(&self, value: T) {
        let guard = &epoch::pin();
        let head = self.head.load(Ordering::Relaxed, guard);
        let head_ref = unsafe { head.deref() };

        // Safety: this handle is the only owner and is not Sync
        let value = match unsafe { head_ref.ring.push_head(value) } {
            Ok(()) => return,
            Err(value) => value,
        };

        let capacity = self.config.next_capacity(head_ref.ring.capacity());
        let segment = Owned::new(Segment::new(capacity));
        segment.prev.store(head, Ordering::Relaxed);
        let segment = segment.into_shared(guard);

        self.head.store(segment, Ordering::Relaxed);
        // From here on `head` receives no pushes; stealers may retire it
        // once drained.
        head_ref.next.store(segment, Ordering::Release);

        let allocated = self.shared.allocated.fetch_add(1, Ordering::Relaxed) + 1;
        self.shared.live.fetch_add(1, Ordering::Relaxed);
        trace!(capacity, allocated, "chain grew a new head segment");

        let pushed = unsafe { segment.deref().ring.push_head(value) };
        debug_assert!(pushed.is_ok(), "fresh segment rejected a push");
    }

    /// Pop the newest value, falling back through older segments
    ///
    /// The pop that empties an older segment also unlinks every drained
    /// segment at the tail, so an empty chain is a single segment and
    /// later empty pops change nothing.
    pub fn pop_head(&self) -> Option<T> {
        let guard = &epoch::pin();
        let head = self.head.load(Ordering::Relaxed, guard);
        let mut segment = head;

        while let Some(segment_ref) = unsafe { segment.as_ref() } {
            if let Some(value) = unsafe { segment_ref.ring.pop_head() } {
                if segment != head && segment_ref.ring.is_empty() {
                    self.shared.compact_tail(head, guard);
                }
                return Some(value);
            }
            segment = segment_ref.prev.load(Ordering::Acquire, guard);
        }

        None
    }

    /// Pop the oldest value, the same operation stealers perform
    pub fn pop_tail(&self) -> Option<T> {
        self.shared.pop_tail()
    }

    /// Handle for other threads to steal from the tail
    pub fn stealer(&self) -> ChainStealer<T> {
        ChainStealer {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Approximate number of queued values
    pub fn len(&self) -> usize {
        self.shared.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Segments allocated over the chain's lifetime
    pub fn segments_allocated(&self) -> usize {
        self.shared.allocated.load(Ordering::Relaxed)
    }

    /// Segments currently linked
    pub fn live_segments(&self) -> usize {
        self.shared.live.load(Ordering::Relaxed)
    }

    /// Capacity of the segment that receives pushes
    pub fn head_capacity(&self) -> usize {
        let guard = &epoch::pin();
        unsafe { self.head.load(Ordering::Relaxed, guard).deref() }
            .ring
            .capacity()
    }
}

impl<T> Default for DequeChain<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for DequeChain<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DequeChain")
            .field("len", &self.len())
            .field("live_segments", &self.live_segments())
            .field("head_capacity", &self.head_capacity())
            .finish()
    }
}

/// Tail-only handle to another worker's chain
pub struct ChainStealer<T> {
    shared: Arc<ChainShared<T>>,
}

impl<T> ChainStealer<T> {
    /// Steal the oldest value
    pub fn pop_tail(&self) -> Option<T> {
        self.shared.pop_tail()
    }

    /// Approximate number of queued values
    pub fn len(&self) -> usize {
        self.shared.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Clone for ChainStealer<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for ChainStealer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainStealer").field("len", &self.len()).finish()
    }
}
