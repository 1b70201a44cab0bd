//! Minimal spin lock built directly on the atomic primitives
//!
//! Used where a full OS mutex is too heavy: one-time initialization guards
//! and as a pluggable lock policy for dynamic heaps. The lock is a single
//! `AtomicU32` with no heap allocation and a trivial destructor; a locked
//! spin lock must not be dropped.
//!
//! Not reentrant. Re-acquiring from the owning thread deadlocks that thread.

use core::sync::atomic::{AtomicU32, Ordering};

use super::atomic::{self, MemoryOrder};
use crate::utils::Backoff;

const UNLOCKED: u32 = 0;
const LOCKED: u32 = 1;

/// Busy-waiting mutual exclusion primitive
pub struct SpinLock {
    state: AtomicU32,
}

impl SpinLock {
    /// Creates an unlocked spin lock
    #[inline]
    pub const fn new() -> Self {
        Self {
            state: AtomicU32::new(UNLOCKED),
        }
    }

    /// Acquires the lock, spinning until it is available
    ///
    /// Contended acquisition backs off exponentially, then yields the
    /// thread's remaining timeslice between attempts.
    #[inline]
    pub fn lock(&self) -> SpinGuard<'_> {
        self.spin_acquire();
        SpinGuard { lock: self }
    }

    /// Single acquisition attempt without blocking
    #[inline]
    pub fn try_lock(&self) -> Option<SpinGuard<'_>> {
        if self.spin_try_acquire() {
            Some(SpinGuard { lock: self })
        } else {
            None
        }
    }

    /// Whether the lock is currently held by some thread
    ///
    /// Race-prone by nature; intended for diagnostics and backoff decisions,
    /// never for correctness.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.state.load(Ordering::Acquire) != UNLOCKED
    }

    /// Spins until the lock is observed unlocked, without acquiring it
    ///
    /// Same caveat as [`is_locked`](Self::is_locked): another thread may
    /// re-acquire between the observation and whatever the caller does next.
    pub fn wait_for_unlock(&self) {
        let mut backoff = Backoff::new();
        while self.is_locked() {
            if backoff.is_completed() {
                std::thread::yield_now();
            } else {
                backoff.spin();
            }
        }
    }

    pub(crate) fn spin_acquire(&self) {
        let mut backoff = Backoff::new();
        while atomic::compare_exchange(&self.state, LOCKED, UNLOCKED, MemoryOrder::Full) != UNLOCKED
        {
            if backoff.is_completed() {
                std::thread::yield_now();
            } else {
                backoff.spin();
            }
        }
    }

    #[inline]
    pub(crate) fn spin_try_acquire(&self) -> bool {
        atomic::compare_exchange(&self.state, LOCKED, UNLOCKED, MemoryOrder::Full) == UNLOCKED
    }

    /// # Safety
    ///
    /// The calling thread must currently hold the lock.
    #[inline]
    pub(crate) unsafe fn spin_release(&self) {
        self.state.store(UNLOCKED, Ordering::Release);
    }
}

impl Default for SpinLock {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for SpinLock {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SpinLock")
            .field("locked", &self.is_locked())
            .finish()
    }
}

/// RAII guard releasing the spin lock on drop
pub struct SpinGuard<'a> {
    lock: &'a SpinLock,
}

impl Drop for SpinGuard<'_> {
    fn drop(&mut self) {
        // SAFETY: the guard's existence proves this thread holds the lock.
        unsafe { self.lock.spin_release() };
    }
}
