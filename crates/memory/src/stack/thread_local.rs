//! Per-thread stack heap dispatch
//!
//! Exactly one [`StackHeap`] exists per OS thread that has used this
//! allocator. The heap is reached through a single process-wide TLS slot,
//! allocated lazily once and shared by every thread; the slot holds a raw
//! pointer to the calling thread's heap (`0` until first use).
//!
//! The heap is owned by its thread and must be released before the thread
//! exits - there is no automatic destruction hook - or its block chain leaks.
//! Worker-thread wrappers call [`ThreadLocalStackAllocator::release_heap`] at
//! the end of the thread callback; threads created by other means must call
//! it themselves.

use std::sync::OnceLock;

use super::config::StackConfig;
use super::heap::StackHeap;
use super::marker::StackMarker;
use crate::tls::{ThreadLocalStorage, TlsSlot};

static HEAP_SLOT: OnceLock<TlsSlot> = OnceLock::new();

fn heap_slot() -> TlsSlot {
    *HEAP_SLOT.get_or_init(|| ThreadLocalStorage::instance().allocate())
}

/// Stateless dispatcher to the calling thread's scratch heap
pub struct ThreadLocalStackAllocator;

impl ThreadLocalStackAllocator {
    /// The calling thread's stack heap, created on first use
    ///
    /// Two calls on one thread return the same instance; calls on different
    /// threads return different instances. The `'static` lifetime holds
    /// until [`release_heap`](Self::release_heap) is called on this thread -
    /// see its safety contract.
    pub fn heap() -> &'static StackHeap {
        let tls = ThreadLocalStorage::instance();
        let slot = heap_slot();
        let word = tls.get(slot);
        if word != 0 {
            // SAFETY: the word was stored below by this thread and is only
            // invalidated by release_heap, whose contract forbids
            // outstanding references.
            return unsafe { &*(word as *const StackHeap) };
        }

        let heap = Box::into_raw(Box::new(StackHeap::new(StackConfig::default())));
        tls.set(slot, heap as usize);
        tracing::debug!(thread = ?std::thread::current().id(), "thread stack heap created");
        // SAFETY: freshly boxed, owned by this thread via the TLS slot.
        unsafe { &*heap }
    }

    /// Destroys the calling thread's heap and clears the slot
    ///
    /// # Safety
    ///
    /// No reference previously returned by [`heap`](Self::heap) on this
    /// thread may be used afterwards, and no [`StackScope`] or
    /// [`StackFrame`](super::StackFrame) over this thread's heap may still
    /// be alive.
    pub unsafe fn release_heap() {
        let tls = ThreadLocalStorage::instance();
        let slot = heap_slot();
        let word = tls.get(slot);
        if word != 0 {
            tls.set(slot, 0);
            // SAFETY: the word is the Box::into_raw result stored by this
            // thread; cleared above so it cannot be dropped twice.
            drop(unsafe { Box::from_raw(word as *mut StackHeap) });
            tracing::debug!(thread = ?std::thread::current().id(), "thread stack heap released");
        }
    }

    /// Opens a scratch scope on the calling thread's heap
    ///
    /// Everything allocated through the scope's heap is freed when the scope
    /// drops. The intended entry point for throwaway buffers that must not
    /// outlive the current call frame.
    pub fn scope() -> StackScope {
        StackScope::new(Self::heap())
    }
}

/// Scoped scratch region on the calling thread's stack heap
pub struct StackScope {
    heap: &'static StackHeap,
    marker: Option<StackMarker>,
}

impl StackScope {
    fn new(heap: &'static StackHeap) -> Self {
        let marker = heap.mark();
        Self {
            heap,
            marker: Some(marker),
        }
    }

    /// The heap to allocate scratch memory from
    pub fn heap(&self) -> &StackHeap {
        self.heap
    }
}

impl Drop for StackScope {
    fn drop(&mut self) {
        if let Some(marker) = self.marker.take() {
            self.heap.release(marker);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_thread_same_heap() {
        let a = ThreadLocalStackAllocator::heap() as *const StackHeap;
        let b = ThreadLocalStackAllocator::heap() as *const StackHeap;
        assert_eq!(a, b);
    }

    #[test]
    fn different_threads_different_heaps() {
        let here = ThreadLocalStackAllocator::heap() as *const StackHeap as usize;
        let there = std::thread::spawn(|| {
            let heap = ThreadLocalStackAllocator::heap() as *const StackHeap as usize;
            // SAFETY: nothing on this thread still references the heap.
            unsafe { ThreadLocalStackAllocator::release_heap() };
            heap
        })
        .join()
        .unwrap();
        assert_ne!(here, there);
    }

    #[test]
    fn scope_rewinds_on_drop() {
        let heap = ThreadLocalStackAllocator::heap();
        let before = heap.used();
        {
            let scope = ThreadLocalStackAllocator::scope();
            scope.heap().alloc(512);
            assert!(heap.used() > before);
        }
        assert_eq!(heap.used(), before);
    }

    #[test]
    fn release_then_reuse_creates_fresh_heap() {
        std::thread::spawn(|| {
            let first = ThreadLocalStackAllocator::heap();
            first.alloc(64);
            // SAFETY: `first` is not used after this point.
            unsafe { ThreadLocalStackAllocator::release_heap() };

            let second = ThreadLocalStackAllocator::heap();
            assert_eq!(second.used(), 0);
            // SAFETY: end of thread, no references remain.
            unsafe { ThreadLocalStackAllocator::release_heap() };
        })
        .join()
        .unwrap();
    }
}
