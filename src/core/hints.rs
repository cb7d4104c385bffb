/*!
 * Compiler and CPU Hints
 * Branch layout hints and busy-wait relaxation for the lock fast paths
 */

#[inline]
#[cold]
fn cold_path() {}

/// Mark a branch as the expected one
///
/// Stable substitute for `llvm.expect`: the untaken side calls a `#[cold]`
/// function, which steers code layout the same way.
#[inline(always)]
#[must_use]
pub fn likely(b: bool) -> bool {
    if !b {
        cold_path();
    }
    b
}

/// Mark a branch as the rare one (contention, misuse, growth)
#[inline(always)]
#[must_use]
pub fn unlikely(b: bool) -> bool {
    if b {
        cold_path();
    }
    b
}

/// Burn `cycles` CPU relax hints without yielding the thread
#[inline]
pub fn relax(cycles: u32) {
    for _ in 0..cycles {
        std::hint::spin_loop();
    }
}
