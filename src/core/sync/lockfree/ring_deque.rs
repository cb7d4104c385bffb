/*!
 * Ring Deque
 *
 * Fixed-capacity lock-free double-ended queue. One owner pushes and pops
 * at the head; any thread may pop (steal) at the tail.
 *
 * # Index Word
 *
 * ```text
 *  63                 32 31                  0
 * +---------------------+---------------------+
 * |        head         |        tail         |
 * +---------------------+---------------------+
 * ```
 *
 * Both indices run over the full 32-bit range and are reduced modulo the
 * capacity only to address a slot, so `head == tail` is empty and
 * `tail + capacity == head` is full. Head and tail pops compete on the same
 * word, so an element is claimed by exactly one of them.
 *
 * # Slot Stamps
 *
 * Each slot records the index its value was written at plus an occupied
 * bit. A claimed slot must carry the stamp of the claimed index, and the
 * owner will not reuse a slot whose occupied bit a slow stealer has not
 * cleared yet. A claim that finds any other stamp panics.
 */

use super::CacheAligned;
use crate::core::errors::SyncResult;
use crate::core::hints::unlikely;
use crate::core::sync::config::check_ring_capacity;
use std::cell::UnsafeCell;
use std::fmt;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicU64, Ordering};

const INDEX_BITS: u32 = 32;
const INDEX_MASK: u64 = (1 << INDEX_BITS) - 1;
const OCCUPIED: u64 = 1 << INDEX_BITS;

#[inline]
fn unpack(word: u64) -> (u32, u32) {
    ((word >> INDEX_BITS) as u32, (word & INDEX_MASK) as u32)
}

#[inline]
fn pack(head: u32, tail: u32) -> u64 {
    ((head as u64) << INDEX_BITS) | tail as u64
}

struct Slot<T> {
    stamp: AtomicU64,
    value: UnsafeCell<MaybeUninit<T>>,
}

/// Fixed-capacity owner/stealer deque
pub struct RingDeque<T> {
    head_tail: CacheAligned<AtomicU64>,
    slots: Box<[Slot<T>]>,
    mask: u32,
}

// Safety: every slot access is claimed through the index word first
unsafe impl<T: Send> Send for RingDeque<T> {}
unsafe impl<T: Send> Sync for RingDeque<T> {}

impl<T> RingDeque<T> {
    /// Create a deque holding up to `capacity` values
    ///
    /// `capacity` must be a power of two between 1 and 2^30.
    pub fn with_capacity(capacity: usize) -> SyncResult<Self> {
        check_ring_capacity(capacity)?;
        Ok(Self::allocate(capacity))
    }

    /// Allocate without validation; `capacity` was checked by the caller
    pub(crate) fn allocate(capacity: usize) -> Self {
        debug_assert!(check_ring_capacity(capacity).is_ok());
        let slots = (0..capacity)
            .map(|_| Slot {
                stamp: AtomicU64::new(0),
                value: UnsafeCell::new(MaybeUninit::uninit()),
            })
            .collect();

        Self {
            head_tail: CacheAligned::new(AtomicU64::new(0)),
            slots,
            mask: (capacity - 1) as u32,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of live entries (racy under concurrent use)
    #[inline]
    pub fn len(&self) -> usize {
        let (head, tail) = unpack(self.head_tail.load(Ordering::Acquire));
        head.wrapping_sub(tail) as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    fn slot(&self, index: u32) -> &Slot<T> {
        &self.slots[(index & self.mask) as usize]
    }

    /// Insert at the head, handing the value back if there is no room
    ///
    /// # Safety
    ///
    /// Owner only: no other thread may run `push_head` or `pop_head` on
    /// this deque concurrently. `pop_tail` may run from any thread.
    pub unsafe fn push_head(&self, value: T) -> Result<(), T> {
        let (head, tail) = unpack(self.head_tail.load(Ordering::Acquire));
        if tail.wrapping_add(self.capacity() as u32) == head {
            return Err(value);
        }

        let slot = self.slot(head);
        // The previous occupant was claimed by a stealer that is still
        // reading it. Treat the deque as full.
        if slot.stamp.load(Ordering::Acquire) & OCCUPIED != 0 {
            return Err(value);
        }

        (*slot.value.get()).write(value);
        slot.stamp.store(OCCUPIED | head as u64, Ordering::Release);
        // Publishes the slot to both ends
        self.head_tail.fetch_add(1 << INDEX_BITS, Ordering::Release);
        Ok(())
    }

    /// Remove the newest value
    ///
    /// # Safety
    ///
    /// Same contract as [`push_head`](Self::push_head).
    pub unsafe fn pop_head(&self) -> Option<T> {
        let mut word = self.head_tail.load(Ordering::Acquire);
        let head = loop {
            let (head, tail) = unpack(word);
            if head == tail {
                return None;
            }

            let head = head.wrapping_sub(1);
            match self.head_tail.compare_exchange_weak(
                word,
                pack(head, tail),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break head,
                Err(current) => word = current,
            }
        };

        Some(self.take(head))
    }

    /// Remove the oldest value; safe from any thread
    pub fn pop_tail(&self) -> Option<T> {
        let mut word = self.head_tail.load(Ordering::Acquire);
        let tail = loop {
            let (head, tail) = unpack(word);
            if head == tail {
                return None;
            }

            match self.head_tail.compare_exchange_weak(
                word,
                pack(head, tail.wrapping_add(1)),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break tail,
                Err(current) => word = current,
            }
        };

        // Safety: the CAS made this thread the only claimant of `tail`
        Some(unsafe { self.take(tail) })
    }

    /// Move the value out of a claimed slot and mark it free
    ///
    /// # Safety
    ///
    /// `index` must have been claimed through the index word by this thread.
    unsafe fn take(&self, index: u32) -> T {
        let slot = self.slot(index);
        let stamp = slot.stamp.load(Ordering::Acquire);
        // Unreachable while push_head refuses slots that are still occupied
        if unlikely(stamp != OCCUPIED | index as u64) {
            panic!("sync: inconsistent ring slot stamp");
        }

        let value = (*slot.value.get()).assume_init_read();
        // Keep the index as the generation, drop the occupied bit
        slot.stamp.store(index as u64, Ordering::Release);
        value
    }
}

impl<T> Drop for RingDeque<T> {
    fn drop(&mut self) {
        for slot in self.slots.iter_mut() {
            if *slot.stamp.get_mut() & OCCUPIED != 0 {
                unsafe { slot.value.get_mut().assume_init_drop() };
            }
        }
    }
}

impl<T> fmt::Debug for RingDeque<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (head, tail) = unpack(self.head_tail.load(Ordering::Relaxed));
        f.debug_struct("RingDeque")
            .field("capacity", &self.capacity())
            .field("head", &head)
            .field("tail", &tail)
            .finish()
    }
}
