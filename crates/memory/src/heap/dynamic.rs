//! Named, independently-lockable dynamic heap
//!
//! A [`DynamicHeap`] wraps a backing general-purpose allocator behind a
//! pluggable lock policy and registers itself in the process-wide heap list
//! for diagnostics. Allocation traffic is serialized per heap; heaps never
//! contend with each other or with list enumeration.

use core::alloc::Layout;
use core::ptr::NonNull;
use std::sync::Arc;

use super::backing::{BackingAllocator, SystemAllocator};
use super::registry;
use super::stats::{AtomicHeapStats, HeapStats};
#[cfg(feature = "leak-tracking")]
use super::tracking::AllocationTracker;
use crate::error::{AllocError, AllocResult};
use crate::sync::{HeapLock, HeapLockGuard, OsMutex};
use crate::utils::DEFAULT_ALIGNMENT;

/// Shared state of one live heap, reachable from the global registry
///
/// The registry hands out references to nodes during enumeration; a node
/// stays alive as long as either its owning [`DynamicHeap`] or an
/// enumeration guard holds it, but leaves the registry the moment the heap
/// is dropped.
pub struct HeapNode {
    name: String,
    lock: Box<dyn HeapLock>,
    backing: Box<dyn BackingAllocator>,
    stats: AtomicHeapStats,
    #[cfg(feature = "leak-tracking")]
    tracking: AllocationTracker,
}

impl HeapNode {
    /// The heap's human-readable name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Allocations currently live in this heap
    pub fn allocation_count(&self) -> usize {
        self.stats.live_allocations()
    }

    /// Bytes currently allocated from this heap
    pub fn bytes_allocated(&self) -> usize {
        self.stats.live_bytes()
    }

    /// Highest observed value of [`bytes_allocated`](Self::bytes_allocated)
    pub fn peak_bytes(&self) -> usize {
        self.stats.peak_bytes()
    }

    /// Snapshot of all counters
    pub fn stats(&self) -> HeapStats {
        self.stats.snapshot()
    }

    #[cfg(feature = "leak-tracking")]
    pub(crate) fn write_leaks(&self, out: &mut dyn core::fmt::Write) -> core::fmt::Result {
        self.tracking.write_report(&self.name, out)
    }
}

impl core::fmt::Debug for HeapNode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HeapNode")
            .field("name", &self.name)
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}

/// Owning handle to a named dynamic heap
///
/// Construction splices the heap into the global list under the list's write
/// lock; dropping the handle removes it again. In between, the heap is live:
/// `allocate`/`deallocate` are legal and the heap shows up in diagnostic
/// enumeration. Outstanding allocations are not reclaimed on drop - freeing
/// them first is the caller's responsibility.
pub struct DynamicHeap {
    node: Arc<HeapNode>,
}

impl DynamicHeap {
    /// Creates a heap over the system allocator with the default OS-mutex
    /// lock policy
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_backing(name, Box::new(OsMutex::new()), Box::new(SystemAllocator::new()))
    }

    /// Creates a heap over the system allocator with an explicit lock policy
    pub fn with_policy(name: impl Into<String>, lock: Box<dyn HeapLock>) -> Self {
        Self::with_backing(name, lock, Box::new(SystemAllocator::new()))
    }

    /// Creates a heap with an explicit lock policy and backing allocator
    pub fn with_backing(
        name: impl Into<String>,
        lock: Box<dyn HeapLock>,
        backing: Box<dyn BackingAllocator>,
    ) -> Self {
        let node = Arc::new(HeapNode {
            name: name.into(),
            lock,
            backing,
            stats: AtomicHeapStats::new(),
            #[cfg(feature = "leak-tracking")]
            tracking: AllocationTracker::new(),
        });
        registry::register(Arc::clone(&node));
        tracing::debug!(heap = %node.name, "dynamic heap created");
        Self { node }
    }

    /// The heap's human-readable name
    pub fn name(&self) -> &str {
        self.node.name()
    }

    /// Allocations currently live in this heap
    pub fn allocation_count(&self) -> usize {
        self.node.allocation_count()
    }

    /// Bytes currently allocated from this heap
    pub fn bytes_allocated(&self) -> usize {
        self.node.bytes_allocated()
    }

    /// Highest observed value of [`bytes_allocated`](Self::bytes_allocated)
    pub fn peak_bytes(&self) -> usize {
        self.node.peak_bytes()
    }

    /// Snapshot of all counters
    pub fn stats(&self) -> HeapStats {
        self.node.stats()
    }

    /// Allocates `size` bytes at the default (malloc-compatible) alignment
    pub fn allocate(&self, size: usize) -> AllocResult<NonNull<u8>> {
        self.allocate_aligned(DEFAULT_ALIGNMENT, size)
    }

    /// Allocates `size` bytes at the given alignment
    pub fn allocate_aligned(&self, align: usize, size: usize) -> AllocResult<NonNull<u8>> {
        let layout = Layout::from_size_align(size, align)
            .map_err(|_| AllocError::invalid_layout("size/alignment do not form a layout"))?;
        self.allocate_layout(layout).map(NonNull::cast)
    }

    /// Allocates memory for `layout` under the heap's own lock
    pub fn allocate_layout(&self, layout: Layout) -> AllocResult<NonNull<[u8]>> {
        let _guard = HeapLockGuard::new(self.node.lock.as_ref());
        // SAFETY: zero-sized layouts are handled by the backing allocator;
        // the lock serializes access to it.
        match unsafe { self.node.backing.allocate(layout) } {
            Ok(ptr) => {
                self.node.stats.record_allocation(layout.size());
                #[cfg(feature = "leak-tracking")]
                self.node.tracking.record(ptr.as_ptr().cast::<u8>() as usize, layout.size());
                Ok(ptr)
            }
            Err(err) => {
                self.node.stats.record_failure();
                Err(err)
            }
        }
    }

    /// Returns an allocation to the backing allocator
    ///
    /// # Safety
    ///
    /// `ptr` must have been allocated by this heap with `layout` and not yet
    /// freed. Freeing through a different heap, or twice, is undefined
    /// behavior (debug builds with `leak-tracking` will at most misreport).
    pub unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        let _guard = HeapLockGuard::new(self.node.lock.as_ref());
        // SAFETY: forwarded caller contract; the lock serializes access.
        unsafe { self.node.backing.deallocate(ptr, layout) };
        self.node.stats.record_deallocation(layout.size());
        #[cfg(feature = "leak-tracking")]
        self.node.tracking.forget(ptr.as_ptr() as usize);
    }

    /// Grows or shrinks an allocation, preserving its prefix
    ///
    /// # Safety
    ///
    /// `ptr` must have been allocated by this heap with `old_layout`. On
    /// success the old pointer is invalid; on failure it remains usable.
    pub unsafe fn reallocate(
        &self,
        ptr: NonNull<u8>,
        old_layout: Layout,
        new_layout: Layout,
    ) -> AllocResult<NonNull<[u8]>> {
        let _guard = HeapLockGuard::new(self.node.lock.as_ref());
        // SAFETY: forwarded caller contract; the lock serializes access.
        match unsafe { self.node.backing.reallocate(ptr, old_layout, new_layout) } {
            Ok(new_ptr) => {
                self.node.stats.record_deallocation(old_layout.size());
                self.node.stats.record_allocation(new_layout.size());
                #[cfg(feature = "leak-tracking")]
                {
                    self.node.tracking.forget(ptr.as_ptr() as usize);
                    self.node
                        .tracking
                        .record(new_ptr.as_ptr().cast::<u8>() as usize, new_layout.size());
                }
                Ok(new_ptr)
            }
            Err(err) => {
                self.node.stats.record_failure();
                Err(err)
            }
        }
    }
}

impl Drop for DynamicHeap {
    fn drop(&mut self) {
        registry::unregister(&self.node);
        tracing::debug!(heap = %self.node.name, "dynamic heap destroyed");
    }
}

impl core::fmt::Debug for DynamicHeap {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Debug::fmt(&self.node, f)
    }
}
