/*!
 * Adaptive Mutex
 *
 * Mutual exclusion with a one-CAS fast path, bounded spinning, and a
 * starvation mode that hands ownership to waiters in arrival order.
 *
 * # State Word
 *
 * ```text
 *  31                                  3   2          1        0
 * +-------------------------------------+----------+-------+--------+
 * |            waiter count             | starving | woken | locked |
 * +-------------------------------------+----------+-------+--------+
 * ```
 *
 * # Modes
 *
 * - **Normal**: waiters queue FIFO, but a woken waiter races newly
 *   arriving threads for the lock. A waiter that loses re-queues at the
 *   front of the queue.
 * - **Starvation**: entered once a waiter has been parked longer than the
 *   starvation threshold. Unlock hands the lock straight to the front
 *   waiter; arrivals neither spin nor take the lock and queue at the back.
 *   The last waiter, or one that waited less than the threshold, switches
 *   the lock back to normal mode.
 */

use crate::core::errors::SyncResult;
use crate::core::hints::{likely, unlikely};
use crate::core::sync::config::MutexConfig;
use crate::core::sync::sema::Semaphore;
use crate::core::sync::spinwait::SpinPolicy;
use std::cell::UnsafeCell;
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

const MUTEX_LOCKED: i32 = 1;
const MUTEX_WOKEN: i32 = 1 << 1;
const MUTEX_STARVING: i32 = 1 << 2;
const MUTEX_WAITER_SHIFT: u32 = 3;
const ONE_WAITER: i32 = 1 << MUTEX_WAITER_SHIFT;

/// Lock word plus sleep queue, without any protected data
///
/// `lock`/`unlock` are not tied to a thread: any thread may unlock a mutex
/// another thread locked. Unlocking a mutex that is not locked panics.
pub struct RawAdaptiveMutex {
    state: AtomicI32,
    sema: Semaphore,
    spin: SpinPolicy,
    starvation_threshold: Duration,
}

impl RawAdaptiveMutex {
    /// Create an unlocked mutex with the standard configuration
    pub const fn new() -> Self {
        Self::from_config(&MutexConfig::standard())
    }

    /// Create an unlocked mutex with custom tuning
    pub fn with_config(config: MutexConfig) -> SyncResult<Self> {
        config.validate()?;
        Ok(Self::from_config(&config))
    }

    const fn from_config(config: &MutexConfig) -> Self {
        Self {
            state: AtomicI32::new(0),
            sema: Semaphore::new(),
            spin: SpinPolicy::new(config),
            starvation_threshold: config.starvation_threshold,
        }
    }

    /// Acquire the lock, parking the thread if it is contended
    #[inline]
    pub fn lock(&self) {
        if likely(
            self.state
                .compare_exchange(0, MUTEX_LOCKED, Ordering::Acquire, Ordering::Relaxed)
                .is_ok(),
        ) {
            return;
        }
        self.lock_slow();
    }

    /// Acquire the lock only if that needs no waiting
    ///
    /// Fails while the lock is held or in starvation mode (where ownership
    /// belongs to the queued waiters).
    #[inline]
    pub fn try_lock(&self) -> bool {
        let old = self.state.load(Ordering::Relaxed);
        if old & (MUTEX_LOCKED | MUTEX_STARVING) != 0 {
            return false;
        }
        self.state
            .compare_exchange(old, old | MUTEX_LOCKED, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Release the lock, waking or handing off to a waiter if any
    ///
    /// # Panics
    ///
    /// Panics if the mutex is not locked.
    #[inline]
    pub fn unlock(&self) {
        let new = self
            .state
            .fetch_sub(MUTEX_LOCKED, Ordering::Release)
            .wrapping_sub(MUTEX_LOCKED);
        if unlikely(new != 0) {
            self.unlock_slow(new);
        }
    }

    /// Waiters accounted in the state word (racy, diagnostics only)
    #[inline]
    pub fn waiter_count(&self) -> usize {
        (self.state.load(Ordering::Relaxed) >> MUTEX_WAITER_SHIFT) as usize
    }

    /// Whether the locked bit is set (racy, diagnostics only)
    ///
    /// During a starvation handoff the bit is briefly clear while ownership
    /// is in transit to the next waiter.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.state.load(Ordering::Relaxed) & MUTEX_LOCKED != 0
    }

    /// Whether a waiter is awake and competing, so unlock need not wake another
    #[inline]
    pub fn is_woken(&self) -> bool {
        self.state.load(Ordering::Relaxed) & MUTEX_WOKEN != 0
    }

    /// Whether the lock is in starvation (FIFO handoff) mode
    #[inline]
    pub fn is_starving(&self) -> bool {
        self.state.load(Ordering::Relaxed) & MUTEX_STARVING != 0
    }

    #[cold]
    fn lock_slow(&self) {
        let mut wait_start: Option<Instant> = None;
        let mut starving = false;
        let mut awoke = false;
        let mut iter = 0u32;
        let mut old = self.state.load(Ordering::Relaxed);

        loop {
            // Spin only while the lock is held in normal mode and nobody is
            // parked behind it: in starvation mode ownership goes to the
            // queue, and a sleeping waiter has seniority over a new arrival.
            // A woken waiter keeps spinning since it is the one competing.
            if old & (MUTEX_LOCKED | MUTEX_STARVING) == MUTEX_LOCKED
                && (awoke || old >> MUTEX_WAITER_SHIFT == 0)
                && self.spin.can_spin(iter)
            {
                self.spin.spin();
                iter += 1;
                old = self.state.load(Ordering::Relaxed);
                continue;
            }

            let mut new = old;
            // Arrivals must not take a starving lock.
            if old & MUTEX_STARVING == 0 {
                new |= MUTEX_LOCKED;
            }
            if old & (MUTEX_LOCKED | MUTEX_STARVING) != 0 {
                new += ONE_WAITER;
            }
            // Only switch to starvation mode while the lock is held; an
            // unlocked starving mutex would never be handed to anyone.
            if starving && old & MUTEX_LOCKED != 0 {
                new |= MUTEX_STARVING;
            }
            if awoke {
                if unlikely(new & MUTEX_WOKEN == 0) {
                    panic!("sync: inconsistent mutex state");
                }
                new &= !MUTEX_WOKEN;
            }

            match self
                .state
                .compare_exchange_weak(old, new, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => {
                    if old & (MUTEX_LOCKED | MUTEX_STARVING) == 0 {
                        // Acquired with the CAS
                        break;
                    }

                    // A waiter that already slept goes back to the front.
                    let queue_lifo = wait_start.is_some();
                    let started = *wait_start.get_or_insert_with(Instant::now);
                    self.sema.acquire(queue_lifo);

                    let waited = started.elapsed();
                    if !starving && waited > self.starvation_threshold {
                        starving = true;
                        debug!(
                            waited_us = waited.as_micros() as u64,
                            "mutex waiter exceeded starvation threshold"
                        );
                    }

                    old = self.state.load(Ordering::Relaxed);
                    if old & MUTEX_STARVING != 0 {
                        // Ownership was handed off: the locked bit is clear and
                        // this thread is still counted as a waiter.
                        if unlikely(
                            old & (MUTEX_LOCKED | MUTEX_WOKEN) != 0
                                || old >> MUTEX_WAITER_SHIFT == 0,
                        ) {
                            panic!("sync: inconsistent mutex state");
                        }
                        let mut delta = MUTEX_LOCKED - ONE_WAITER;
                        if !starving || old >> MUTEX_WAITER_SHIFT == 1 {
                            delta -= MUTEX_STARVING;
                            debug!(
                                waiters = (old >> MUTEX_WAITER_SHIFT) - 1,
                                "mutex leaving starvation mode"
                            );
                        }
                        self.state.fetch_add(delta, Ordering::Acquire);
                        break;
                    }

                    awoke = true;
                    iter = 0;
                }
                Err(current) => old = current,
            }
        }
    }

    #[cold]
    fn unlock_slow(&self, new: i32) {
        if new.wrapping_add(MUTEX_LOCKED) & MUTEX_LOCKED == 0 {
            // Put the word back before failing so the state stays decodable.
            self.state.fetch_add(MUTEX_LOCKED, Ordering::Relaxed);
            panic!("sync: unlock of unlocked mutex");
        }

        if new & MUTEX_STARVING == 0 {
            let mut old = new;
            loop {
                // Nobody to wake, or someone already took the lock, is awake,
                // or the mode flipped: whoever it is will make progress.
                if old >> MUTEX_WAITER_SHIFT == 0
                    || old & (MUTEX_LOCKED | MUTEX_WOKEN | MUTEX_STARVING) != 0
                {
                    return;
                }
                let next = (old - ONE_WAITER) | MUTEX_WOKEN;
                match self.state.compare_exchange_weak(
                    old,
                    next,
                    Ordering::Release,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        self.sema.release(false);
                        return;
                    }
                    Err(current) => old = current,
                }
            }
        } else {
            // Starvation mode: the front waiter owns the lock from here.
            // The locked bit stays clear until it runs, but the starving bit
            // keeps arrivals from taking it.
            self.sema.release(true);
        }
    }
}

impl Default for RawAdaptiveMutex {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RawAdaptiveMutex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawAdaptiveMutex")
            .field("locked", &self.is_locked())
            .field("woken", &self.is_woken())
            .field("starving", &self.is_starving())
            .field("waiters", &self.waiter_count())
            .finish()
    }
}

/// Adaptive mutex protecting a value
pub struct AdaptiveMutex<T: ?Sized> {
    raw: RawAdaptiveMutex,
    data: UnsafeCell<T>,
}

// Safety: the raw lock serializes every access to `data`
unsafe impl<T: ?Sized + Send> Send for AdaptiveMutex<T> {}
unsafe impl<T: ?Sized + Send> Sync for AdaptiveMutex<T> {}

impl<T> AdaptiveMutex<T> {
    pub const fn new(value: T) -> Self {
        Self {
            raw: RawAdaptiveMutex::new(),
            data: UnsafeCell::new(value),
        }
    }

    pub fn with_config(value: T, config: MutexConfig) -> SyncResult<Self> {
        Ok(Self {
            raw: RawAdaptiveMutex::with_config(config)?,
            data: UnsafeCell::new(value),
        })
    }

    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: ?Sized> AdaptiveMutex<T> {
    /// Lock and return a guard that unlocks on drop
    #[inline]
    pub fn lock(&self) -> AdaptiveMutexGuard<'_, T> {
        self.raw.lock();
        AdaptiveMutexGuard {
            mutex: self,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn try_lock(&self) -> Option<AdaptiveMutexGuard<'_, T>> {
        if self.raw.try_lock() {
            Some(AdaptiveMutexGuard {
                mutex: self,
                _marker: PhantomData,
            })
        } else {
            None
        }
    }

    /// Mutable access without locking (exclusive borrow proves no guard exists)
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    /// Underlying lock, for state diagnostics
    pub fn raw(&self) -> &RawAdaptiveMutex {
        &self.raw
    }
}

impl<T: Default> Default for AdaptiveMutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> From<T> for AdaptiveMutex<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for AdaptiveMutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("AdaptiveMutex");
        match self.try_lock() {
            Some(guard) => d.field("data", &&*guard),
            None => d.field("data", &format_args!("<locked>")),
        };
        d.finish()
    }
}

/// RAII guard; the lock is released when it goes out of scope
#[must_use = "if unused the mutex will immediately unlock"]
pub struct AdaptiveMutexGuard<'a, T: ?Sized> {
    mutex: &'a AdaptiveMutex<T>,
    // Ties Send/Sync of the guard to T like `&mut T` would
    _marker: PhantomData<&'a mut T>,
}

impl<T: ?Sized> Deref for AdaptiveMutexGuard<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        unsafe { &*self.mutex.data.get() }
    }
}

impl<T: ?Sized> DerefMut for AdaptiveMutexGuard<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.mutex.data.get() }
    }
}

impl<T: ?Sized> Drop for AdaptiveMutexGuard<'_, T> {
    #[inline]
    fn drop(&mut self) {
        self.mutex.raw.unlock();
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for AdaptiveMutexGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}
