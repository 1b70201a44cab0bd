//! Lock with same-thread re-entry, used by allocation tracking
//!
//! The leak-report path may allocate from the very heap it is reporting on
//! (symbol resolution buffers), which re-enters the tracker on the same
//! thread. This lock lets that inner section piggyback on the outer one by
//! comparing a stored owning-thread token instead of re-locking.
//!
//! This is deliberately narrower than a counting recursive mutex: nested
//! re-entry on one thread works, but the lock cannot express two independent
//! logical critical sections on the same thread. Callers depend on exactly
//! this semantic; do not "upgrade" it.

use core::sync::atomic::{AtomicU64, Ordering};

use super::spin::SpinLock;

static NEXT_THREAD_TOKEN: AtomicU64 = AtomicU64::new(1);

std::thread_local! {
    static THREAD_TOKEN: u64 = NEXT_THREAD_TOKEN.fetch_add(1, Ordering::Relaxed);
}

/// Process-unique, never-zero token for the calling thread
#[inline]
fn current_thread_token() -> u64 {
    THREAD_TOKEN.with(|t| *t)
}

/// Spin lock that records its owning thread and admits that thread again
/// without re-locking
pub struct ThreadOwnedLock {
    lock: SpinLock,
    /// Token of the owning thread, 0 while unowned. Written only by the
    /// owner while the inner lock is held.
    owner: AtomicU64,
}

impl ThreadOwnedLock {
    /// Creates an unowned lock
    pub const fn new() -> Self {
        Self {
            lock: SpinLock::new(),
            owner: AtomicU64::new(0),
        }
    }

    /// Enters the critical section, blocking unless the calling thread
    /// already owns it
    ///
    /// Dropping the returned guard leaves recursive entries owned and
    /// releases the lock only on the outermost exit.
    pub fn enter(&self) -> ReentrancyGuard<'_> {
        let me = current_thread_token();
        if self.owner.load(Ordering::Acquire) == me {
            return ReentrancyGuard {
                lock: self,
                recursive: true,
            };
        }
        self.lock.spin_acquire();
        self.owner.store(me, Ordering::Release);
        ReentrancyGuard {
            lock: self,
            recursive: false,
        }
    }
}

impl Default for ThreadOwnedLock {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard for a [`ThreadOwnedLock`] critical section
pub struct ReentrancyGuard<'a> {
    lock: &'a ThreadOwnedLock,
    recursive: bool,
}

impl ReentrancyGuard<'_> {
    /// Whether this entry piggybacked on an outer entry by the same thread
    pub fn is_recursive(&self) -> bool {
        self.recursive
    }
}

impl Drop for ReentrancyGuard<'_> {
    fn drop(&mut self) {
        if self.recursive {
            return;
        }
        debug_assert_eq!(
            self.lock.owner.load(Ordering::Acquire),
            current_thread_token(),
            "thread-owned lock released by a non-owner"
        );
        self.lock.owner.store(0, Ordering::Release);
        // SAFETY: this guard is the outermost entry, so the thread holds the
        // inner spin lock.
        unsafe { self.lock.lock.spin_release() };
    }
}
