/*!
 * Parking Semaphore
 *
 * Counting semaphore whose waiters park on their own grant flag through
 * parking_lot_core. The adaptive mutex uses it as its sleep queue:
 * - FIFO by default, with front insertion for waiters that were already woken once
 * - Direct permit handoff to the front waiter on release
 *
 * # Design
 *
 * Each waiter parks on the address of its private `granted` flag, so a
 * release only ever unparks the thread it picked. The flag is re-checked
 * inside the park validation callback (which runs under the parking
 * bucket lock), so a grant that races the park is never lost.
 */

use parking_lot::Mutex;
use parking_lot_core::{park, unpark_one, DEFAULT_PARK_TOKEN, DEFAULT_UNPARK_TOKEN};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

/// A parked thread waiting for a permit
struct Waiter {
    granted: AtomicBool,
}

impl Waiter {
    fn new() -> Self {
        Self {
            granted: AtomicBool::new(false),
        }
    }

    #[inline]
    fn park_key(&self) -> usize {
        &self.granted as *const AtomicBool as usize
    }

    /// Block until `grant` is called
    fn wait(&self) {
        while !self.granted.load(Ordering::Acquire) {
            // Unparks can be spurious if a stale key collides; the loop re-checks.
            unsafe {
                park(
                    self.park_key(),
                    || !self.granted.load(Ordering::Acquire),
                    || {},
                    |_, _| {},
                    DEFAULT_PARK_TOKEN,
                    None,
                );
            }
        }
    }

    fn grant(&self) {
        self.granted.store(true, Ordering::Release);
        unsafe {
            unpark_one(self.park_key(), |_| DEFAULT_UNPARK_TOKEN);
        }
    }
}

struct SemaState {
    permits: usize,
    waiters: VecDeque<Arc<Waiter>>,
}

/// Counting semaphore with FIFO/LIFO queueing and direct handoff
pub struct Semaphore {
    state: Mutex<SemaState>,
}

impl Semaphore {
    /// Create a semaphore with no permits
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(SemaState {
                permits: 0,
                waiters: VecDeque::new(),
            }),
        }
    }

    /// Take a permit, parking until one is released
    ///
    /// With `lifo` set the caller queues ahead of every current waiter.
    pub fn acquire(&self, lifo: bool) {
        let waiter = {
            let mut state = self.state.lock();
            if state.permits > 0 {
                state.permits -= 1;
                return;
            }

            let waiter = Arc::new(Waiter::new());
            if lifo {
                state.waiters.push_front(Arc::clone(&waiter));
            } else {
                state.waiters.push_back(Arc::clone(&waiter));
            }
            waiter
        };

        waiter.wait();
    }

    /// Take a permit only if one is immediately available
    #[cfg(test)]
    fn try_acquire(&self) -> bool {
        let mut state = self.state.lock();
        if state.permits > 0 {
            state.permits -= 1;
            true
        } else {
            false
        }
    }

    /// Release one permit
    ///
    /// The permit goes straight to the front waiter if there is one. With
    /// `handoff` set the releasing thread then yields so the woken thread
    /// can run immediately.
    pub fn release(&self, handoff: bool) {
        let next = {
            let mut state = self.state.lock();
            match state.waiters.pop_front() {
                Some(waiter) => waiter,
                None => {
                    state.permits += 1;
                    return;
                }
            }
        };

        next.grant();
        if handoff {
            thread::yield_now();
        }
    }

    /// Number of parked threads (racy, diagnostics only)
    pub fn waiters(&self) -> usize {
        self.state.lock().waiters.len()
    }

    /// Number of stored permits
    #[cfg(test)]
    fn permits(&self) -> usize {
        self.state.lock().permits
    }
}

impl Default for Semaphore {
    fn default() -> Self {
        Self::new()
    }
}
