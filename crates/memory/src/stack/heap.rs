//! Growable bump arena with marker-based rewind
//!
//! # Safety
//!
//! The heap owns a chain of raw blocks obtained from the system allocator:
//! - every handed-out pointer lies inside one owned block,
//! - the cursor (block index, offset) only moves forward between rewinds,
//! - rewinding retains blocks for reuse; they are returned to the system
//!   only when the heap is dropped.
//!
//! The type is thread-confined by construction (`Cell` state, `!Sync`).
//! It is never locked because it is never shared across threads.

use core::cell::{Cell, RefCell};
use core::ptr::{self, NonNull};
use std::alloc::{self, handle_alloc_error, Layout};

use super::config::StackConfig;
use super::marker::StackMarker;
use crate::utils::{align_up, DEFAULT_ALIGNMENT};

// Blocks are carved with this alignment so any request with align <= 16
// needs no extra slack; larger alignments reserve `align` spare bytes.
const BLOCK_ALIGN: usize = 16;

struct Block {
    ptr: NonNull<u8>,
    layout: Layout,
}

/// Arena allocator serving requests by advancing a cursor through
/// sequentially-filled blocks
///
/// Individual deallocation is deliberately unsupported; memory comes back in
/// bulk through [`mark`](Self::mark)/[`release`](Self::release) (or the RAII
/// [`StackFrame`](super::StackFrame)), which rewind the cursor in strict LIFO
/// order. Exhaustion of the backing system allocator while growing the chain
/// is fatal - scratch arenas are not expected to outgrow the address space.
pub struct StackHeap {
    blocks: RefCell<Vec<Block>>,
    /// Index of the block the cursor currently fills
    block_index: Cell<usize>,
    /// Fill offset within the current block
    offset: Cell<usize>,
    /// Outstanding markers, for the LIFO-order check
    mark_depth: Cell<usize>,
    total_allocs: Cell<u64>,
    config: StackConfig,
}

enum Step {
    Serve(NonNull<u8>),
    Advance,
    Grow,
}

impl StackHeap {
    /// Creates an empty heap; the first block is allocated lazily
    pub fn new(config: StackConfig) -> Self {
        assert!(config.block_size > 0, "block size cannot be zero");
        Self {
            blocks: RefCell::new(Vec::new()),
            block_index: Cell::new(0),
            offset: Cell::new(0),
            mark_depth: Cell::new(0),
            total_allocs: Cell::new(0),
            config,
        }
    }

    /// Bump-allocates `size` bytes at the default (malloc-compatible) alignment
    pub fn alloc(&self, size: usize) -> NonNull<u8> {
        self.alloc_aligned(DEFAULT_ALIGNMENT, size)
    }

    /// Bump-allocates `size` bytes at the given alignment
    ///
    /// Zero-sized requests return a dangling pointer. Growing the block chain
    /// aborts the process if the system allocator refuses (see type docs).
    pub fn alloc_aligned(&self, align: usize, size: usize) -> NonNull<u8> {
        assert!(align.is_power_of_two(), "alignment must be a power of two");
        if size == 0 {
            // SAFETY: align is a non-zero power of two, so the address is
            // non-null and satisfies the requested alignment.
            return unsafe { NonNull::new_unchecked(align as *mut u8) };
        }

        loop {
            let step = {
                let blocks = self.blocks.borrow();
                match blocks.get(self.block_index.get()) {
                    Some(block) => {
                        let base = block.ptr.as_ptr() as usize;
                        let aligned = align_up(base + self.offset.get(), align);
                        let end = aligned
                            .checked_add(size)
                            .unwrap_or_else(|| oversized_request(size));
                        if end <= base + block.layout.size() {
                            self.offset.set(end - base);
                            if self.config.track_stats {
                                self.total_allocs.set(self.total_allocs.get() + 1);
                            }
                            if let Some(pattern) = self.config.alloc_pattern {
                                // SAFETY: [aligned, end) is inside the current
                                // block and beyond the old cursor, so nothing
                                // live is overwritten.
                                unsafe { ptr::write_bytes(aligned as *mut u8, pattern, size) };
                            }
                            // SAFETY: aligned >= base and base is non-null.
                            Step::Serve(unsafe { NonNull::new_unchecked(aligned as *mut u8) })
                        } else if self.block_index.get() + 1 < blocks.len() {
                            Step::Advance
                        } else {
                            Step::Grow
                        }
                    }
                    None => Step::Grow,
                }
            };

            match step {
                Step::Serve(ptr) => return ptr,
                Step::Advance => {
                    // Move the cursor into a block retained by an earlier
                    // rewind and start filling it from the beginning.
                    self.block_index.set(self.block_index.get() + 1);
                    self.offset.set(0);
                }
                Step::Grow => self.grow(align, size),
            }
        }
    }

    /// Captures the current cursor position
    pub fn mark(&self) -> StackMarker {
        let depth = self.mark_depth.get();
        self.mark_depth.set(depth + 1);
        StackMarker {
            block: self.block_index.get(),
            offset: self.offset.get(),
            depth,
        }
    }

    /// Rewinds the cursor to `marker`, bulk-freeing everything allocated
    /// after it was taken
    ///
    /// Blocks the cursor retreats past are kept for reuse, bounding future
    /// growth. Markers must be released in reverse order of acquisition;
    /// violating that is a contract violation flagged in debug builds.
    pub fn release(&self, marker: StackMarker) {
        let depth = self.mark_depth.get();
        debug_assert!(depth > 0, "marker released against an unmarked heap");
        debug_assert_eq!(
            marker.depth + 1,
            depth,
            "stack markers must be released in LIFO order"
        );
        debug_assert!(
            marker.block < self.block_index.get()
                || (marker.block == self.block_index.get()
                    && marker.offset <= self.offset.get()),
            "marker points past the current cursor"
        );
        self.mark_depth.set(marker.depth);
        self.block_index.set(marker.block);
        self.offset.set(marker.offset);
    }

    /// Number of blocks currently in the chain
    pub fn block_count(&self) -> usize {
        self.blocks.borrow().len()
    }

    /// Bytes between the start of the chain and the cursor
    ///
    /// Includes padding and the unused tails of blocks the cursor has moved
    /// past; a fill level, not an exact sum of live requests.
    pub fn used(&self) -> usize {
        let blocks = self.blocks.borrow();
        let filled: usize = blocks
            .iter()
            .take(self.block_index.get())
            .map(|b| b.layout.size())
            .sum();
        filled + self.offset.get()
    }

    /// Allocations served so far, when `track_stats` is enabled
    pub fn total_allocations(&self) -> u64 {
        self.total_allocs.get()
    }

    /// The configured block size
    pub fn block_size(&self) -> usize {
        self.config.block_size
    }

    #[cold]
    fn grow(&self, align: usize, size: usize) {
        // Reserve worst-case alignment slack so the request always fits.
        let needed = align_up(size, BLOCK_ALIGN)
            .checked_add(align)
            .unwrap_or_else(|| oversized_request(size));
        let capacity = self.config.block_size.max(needed);
        let layout = match Layout::from_size_align(capacity, BLOCK_ALIGN) {
            Ok(layout) => layout,
            Err(_) => oversized_request(size),
        };

        // SAFETY: layout has non-zero size (block_size > 0 is asserted at
        // construction).
        let raw = unsafe { alloc::alloc(layout) };
        let Some(ptr) = NonNull::new(raw) else {
            handle_alloc_error(layout);
        };

        let mut blocks = self.blocks.borrow_mut();
        blocks.push(Block { ptr, layout });
        self.block_index.set(blocks.len() - 1);
        self.offset.set(0);
    }
}

impl Drop for StackHeap {
    fn drop(&mut self) {
        for block in self.blocks.get_mut().drain(..) {
            // SAFETY: each block was allocated by `grow` with exactly this
            // layout and is freed exactly once.
            unsafe { alloc::dealloc(block.ptr.as_ptr(), block.layout) };
        }
    }
}

impl core::fmt::Debug for StackHeap {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StackHeap")
            .field("blocks", &self.block_count())
            .field("used", &self.used())
            .field("outstanding_marks", &self.mark_depth.get())
            .finish()
    }
}

#[cold]
fn oversized_request(size: usize) -> ! {
    panic!("stack heap request of {size} bytes overflows the address space");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heap() -> StackHeap {
        StackHeap::new(StackConfig::default().with_block_size(4096))
    }

    #[test]
    fn sequential_allocations_do_not_overlap() {
        let heap = heap();
        let a = heap.alloc(64).as_ptr() as usize;
        let b = heap.alloc(64).as_ptr() as usize;
        assert!(b >= a + 64);
    }

    #[test]
    fn respects_alignment() {
        let heap = heap();
        heap.alloc(3);
        let p = heap.alloc_aligned(128, 32).as_ptr() as usize;
        assert_eq!(p % 128, 0);
    }

    #[test]
    fn grows_past_block_size() {
        let heap = heap();
        // Larger than a single 4 KiB block.
        let p = heap.alloc(16 * 1024);
        // SAFETY: freshly allocated, exclusively owned region.
        unsafe { ptr::write_bytes(p.as_ptr(), 0xAB, 16 * 1024) };
        assert!(heap.block_count() >= 1);

        // Fill enough small allocations to force more blocks.
        for _ in 0..16 {
            heap.alloc(1024);
        }
        assert!(heap.block_count() > 1);
    }

    #[test]
    fn rewind_restores_cursor_and_reuses_memory() {
        let heap = heap();
        heap.alloc(100);
        let used_at_mark = heap.used();
        let marker = heap.mark();

        let b = heap.alloc(200).as_ptr() as usize;
        heap.release(marker);
        assert_eq!(heap.used(), used_at_mark);

        // A follow-up allocation no larger than the freed region lands
        // inside it.
        let c = heap.alloc(150).as_ptr() as usize;
        assert!(c < b + 200 && c + 150 > b);
    }

    #[test]
    fn rewind_retains_blocks() {
        let heap = heap();
        let marker = heap.mark();
        for _ in 0..8 {
            heap.alloc(2048);
        }
        let grown = heap.block_count();
        assert!(grown > 1);
        heap.release(marker);
        // Blocks are kept for reuse, not returned to the system.
        assert_eq!(heap.block_count(), grown);
        for _ in 0..8 {
            heap.alloc(2048);
        }
        assert_eq!(heap.block_count(), grown);
    }

    #[test]
    fn zero_sized_allocation_is_aligned_and_allocates_nothing() {
        let heap = heap();
        let p = heap.alloc(0);
        assert_eq!(p.as_ptr() as usize, DEFAULT_ALIGNMENT);
        assert_eq!(heap.block_count(), 0);

        let p = heap.alloc_aligned(64, 0);
        assert_eq!(p.as_ptr() as usize % 64, 0);
        assert_eq!(heap.block_count(), 0);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "LIFO order")]
    fn out_of_order_release_is_flagged() {
        let heap = heap();
        let first = heap.mark();
        heap.alloc(32);
        let _second = heap.mark();
        heap.alloc(32);
        // Releasing the earlier marker while the later one is outstanding
        // violates the nesting contract.
        heap.release(first);
    }

    #[test]
    fn nested_markers_in_lifo_order() {
        let heap = heap();
        let outer = heap.mark();
        heap.alloc(64);
        let inner = heap.mark();
        heap.alloc(64);
        heap.release(inner);
        heap.release(outer);
        assert_eq!(heap.used(), 0);
    }

    #[test]
    fn tracks_allocation_count() {
        let heap = StackHeap::new(StackConfig::debug().with_block_size(4096));
        heap.alloc(8);
        heap.alloc(8);
        assert_eq!(heap.total_allocations(), 2);
    }
}
