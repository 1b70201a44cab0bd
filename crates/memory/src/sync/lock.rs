//! Pluggable lock policy for dynamic heaps
//!
//! The backing allocator of a [`DynamicHeap`](crate::heap::DynamicHeap) is
//! serialized through whatever lock the heap was constructed with. The policy
//! is an explicit capability passed in at construction rather than a
//! compile-time substitution, so a heap on a hot path can take a
//! [`SpinLock`] while everything else uses the OS mutex.

use parking_lot::lock_api::RawMutex as _;

use super::spin::SpinLock;

/// Raw lock capability plugged into a dynamic heap
///
/// Object-safe so heaps with different policies can share one registry.
pub trait HeapLock: Send + Sync {
    /// Block until the lock is held
    fn acquire(&self);

    /// Single acquisition attempt
    fn try_acquire(&self) -> bool;

    /// Release the lock
    ///
    /// # Safety
    ///
    /// The calling thread must currently hold the lock.
    unsafe fn release(&self);
}

impl HeapLock for SpinLock {
    fn acquire(&self) {
        self.spin_acquire();
    }

    fn try_acquire(&self) -> bool {
        self.spin_try_acquire()
    }

    unsafe fn release(&self) {
        // SAFETY: forwarded caller contract; the thread holds the lock.
        unsafe { self.spin_release() };
    }
}

/// OS-mutex lock policy, the default for new heaps
///
/// Thin wrapper over `parking_lot`'s raw mutex: uncontended acquisition is a
/// single CAS, contended threads park in the kernel instead of spinning.
pub struct OsMutex {
    raw: parking_lot::RawMutex,
}

impl OsMutex {
    /// Creates an unlocked mutex
    #[inline]
    pub const fn new() -> Self {
        Self {
            raw: parking_lot::RawMutex::INIT,
        }
    }
}

impl Default for OsMutex {
    fn default() -> Self {
        Self::new()
    }
}

impl HeapLock for OsMutex {
    fn acquire(&self) {
        self.raw.lock();
    }

    fn try_acquire(&self) -> bool {
        self.raw.try_lock()
    }

    unsafe fn release(&self) {
        // SAFETY: forwarded caller contract; the thread holds the lock.
        unsafe { self.raw.unlock() };
    }
}

/// Scoped acquisition of a type-erased heap lock
pub(crate) struct HeapLockGuard<'a> {
    lock: &'a dyn HeapLock,
}

impl<'a> HeapLockGuard<'a> {
    #[inline]
    pub(crate) fn new(lock: &'a dyn HeapLock) -> Self {
        lock.acquire();
        Self { lock }
    }
}

impl Drop for HeapLockGuard<'_> {
    fn drop(&mut self) {
        // SAFETY: the guard's existence proves this thread holds the lock.
        unsafe { self.lock.release() };
    }
}
