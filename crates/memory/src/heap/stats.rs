//! Per-heap allocation statistics
//!
//! Counters are atomic so the diagnostic report can read them while other
//! threads allocate; Relaxed ordering is enough because the numbers are
//! advisory, never a synchronization protocol.

use core::sync::atomic::{AtomicUsize, Ordering};

use crate::utils::atomic_max;

/// Snapshot of a heap's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
    /// Allocations currently live
    pub live_allocations: usize,
    /// Bytes currently allocated
    pub live_bytes: usize,
    /// Highest observed value of `live_bytes`
    pub peak_bytes: usize,
    /// Allocations ever served
    pub total_allocations: usize,
    /// Deallocations ever served
    pub total_frees: usize,
    /// Requests the backing allocator refused
    pub failed_allocations: usize,
}

impl core::fmt::Display for HeapStats {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{} live allocations, {} bytes (peak {}), {} failed",
            self.live_allocations, self.live_bytes, self.peak_bytes, self.failed_allocations
        )
    }
}

/// Thread-safe counter block backing [`HeapStats`]
#[derive(Debug, Default)]
pub struct AtomicHeapStats {
    live_allocations: AtomicUsize,
    live_bytes: AtomicUsize,
    peak_bytes: AtomicUsize,
    total_allocations: AtomicUsize,
    total_frees: AtomicUsize,
    failed_allocations: AtomicUsize,
}

impl AtomicHeapStats {
    /// Creates a zeroed counter block
    pub const fn new() -> Self {
        Self {
            live_allocations: AtomicUsize::new(0),
            live_bytes: AtomicUsize::new(0),
            peak_bytes: AtomicUsize::new(0),
            total_allocations: AtomicUsize::new(0),
            total_frees: AtomicUsize::new(0),
            failed_allocations: AtomicUsize::new(0),
        }
    }

    /// Record a successful allocation of `size` bytes
    pub fn record_allocation(&self, size: usize) {
        self.live_allocations.fetch_add(1, Ordering::Relaxed);
        self.total_allocations.fetch_add(1, Ordering::Relaxed);
        let live = self.live_bytes.fetch_add(size, Ordering::Relaxed) + size;
        atomic_max(&self.peak_bytes, live);
    }

    /// Record a deallocation of `size` bytes
    pub fn record_deallocation(&self, size: usize) {
        self.live_allocations.fetch_sub(1, Ordering::Relaxed);
        self.total_frees.fetch_add(1, Ordering::Relaxed);
        self.live_bytes.fetch_sub(size, Ordering::Relaxed);
    }

    /// Record a request the backing allocator refused
    pub fn record_failure(&self) {
        self.failed_allocations.fetch_add(1, Ordering::Relaxed);
    }

    /// Allocations currently live
    pub fn live_allocations(&self) -> usize {
        self.live_allocations.load(Ordering::Relaxed)
    }

    /// Bytes currently allocated
    pub fn live_bytes(&self) -> usize {
        self.live_bytes.load(Ordering::Relaxed)
    }

    /// Highest observed value of [`live_bytes`](Self::live_bytes)
    pub fn peak_bytes(&self) -> usize {
        self.peak_bytes.load(Ordering::Relaxed)
    }

    /// Point-in-time snapshot of all counters
    pub fn snapshot(&self) -> HeapStats {
        HeapStats {
            live_allocations: self.live_allocations.load(Ordering::Relaxed),
            live_bytes: self.live_bytes.load(Ordering::Relaxed),
            peak_bytes: self.peak_bytes.load(Ordering::Relaxed),
            total_allocations: self.total_allocations.load(Ordering::Relaxed),
            total_frees: self.total_frees.load(Ordering::Relaxed),
            failed_allocations: self.failed_allocations.load(Ordering::Relaxed),
        }
    }
}
